use std::time::{Duration, Instant};

/// Decides when the view should follow the active entry.
///
/// A manual scroll pauses following for `cooldown`; afterwards the next change
/// of active entry scrolls again.
#[derive(Debug, Clone)]
pub struct AutoScroll {
    cooldown: Duration,
    manual_at: Option<Instant>,
    last_index: Option<usize>,
}

impl AutoScroll {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            manual_at: None,
            last_index: None,
        }
    }

    #[allow(dead_code)]
    pub fn manual_scroll(&mut self, now: Instant) {
        self.manual_at = Some(now);
    }

    pub fn is_paused(&self, now: Instant) -> bool {
        self.manual_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.cooldown)
    }

    /// Index to scroll to, if the active entry moved and following is on.
    pub fn follow(&mut self, now: Instant, index: Option<usize>) -> Option<usize> {
        let index = index?;
        if self.is_paused(now) || self.last_index == Some(index) {
            return None;
        }
        self.manual_at = None;
        self.last_index = Some(index);
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follows_changes_only() {
        let mut s = AutoScroll::new(Duration::from_secs(3));
        let now = Instant::now();
        assert_eq!(s.follow(now, Some(0)), Some(0));
        assert_eq!(s.follow(now, Some(0)), None);
        assert_eq!(s.follow(now, Some(1)), Some(1));
        assert_eq!(s.follow(now, None), None);
    }

    #[test]
    fn test_manual_scroll_cooldown() {
        let mut s = AutoScroll::new(Duration::from_secs(3));
        let t0 = Instant::now();
        s.follow(t0, Some(0));
        s.manual_scroll(t0);
        assert_eq!(s.follow(t0 + Duration::from_secs(1), Some(1)), None);
        assert!(s.is_paused(t0 + Duration::from_secs(2)));
        // Cooldown over: catch up with the active line
        assert_eq!(s.follow(t0 + Duration::from_secs(4), Some(2)), Some(2));
        assert!(!s.is_paused(t0 + Duration::from_secs(4)));
    }
}
