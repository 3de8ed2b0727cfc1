//! Active-entry lookup for a playback position.
//!
//! Stateless: called every tick with whatever the clock says, including
//! repeated or rewound positions after a seek.

use crate::lyrics::Timed;

/// Where an entry sits relative to the playback position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Current,
    Completed,
    Upcoming,
}

impl EntryState {
    /// Current iff `start <= t < end`, completed iff `end <= t`, else upcoming.
    pub fn classify(start: f64, end: f64, t: f64) -> Self {
        if start > t {
            EntryState::Upcoming
        } else if t < end {
            EntryState::Current
        } else {
            EntryState::Completed
        }
    }
}

/// Result of [`find_active`]. `index` is `None` only for an empty timeline
/// (or one made solely of skipped markers).
#[derive(Debug, PartialEq)]
pub struct Lookup<'a, T> {
    pub index: Option<usize>,
    pub entry: Option<&'a T>,
    pub state: EntryState,
}

impl<T> Clone for Lookup<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Lookup<'_, T> {}

impl<'a, T> Lookup<'a, T> {
    fn none() -> Self {
        Self {
            index: None,
            entry: None,
            state: EntryState::Upcoming,
        }
    }
}

/// Playback position shifted by an offset in milliseconds.
pub fn adjusted_time(current_secs: f64, offset_ms: i32) -> f64 {
    current_secs + f64::from(offset_ms) / 1000.0
}

/// Find the entry governing `current_secs + offset_ms`.
///
/// `timeline` must be sorted by start. The greatest entry whose start is at
/// or before the adjusted time is `Current` if the time is still inside it and
/// `Completed` otherwise (a gap, or past the last entry). Before the first
/// entry the first one is reported as `Upcoming`. With `skip_markers`, a
/// marker hit moves to the next non-marker entry, or back to the previous one
/// when the timeline ends in markers.
pub fn find_active<T: Timed>(
    timeline: &[T],
    current_secs: f64,
    offset_ms: i32,
    skip_markers: bool,
) -> Lookup<'_, T> {
    if timeline.is_empty() {
        return Lookup::none();
    }

    let t = adjusted_time(current_secs, offset_ms);
    let after = timeline.partition_point(|e| e.start() <= t);
    let mut index = after.saturating_sub(1);

    if skip_markers && timeline[index].is_marker() {
        let forward = timeline[index..].iter().position(|e| !e.is_marker());
        let backward = || timeline[..index].iter().rposition(|e| !e.is_marker());
        match forward.map(|p| index + p).or_else(backward) {
            Some(i) => index = i,
            None => return Lookup::none(),
        }
    }

    let entry = &timeline[index];
    Lookup {
        index: Some(index),
        entry: Some(entry),
        state: EntryState::classify(entry.start(), entry.end(), t),
    }
}
