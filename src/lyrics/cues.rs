use once_cell::sync::Lazy;
use regex::Regex;

use super::matcher::{MatchOptions, align};
use super::models::{AlignedWord, LineCue};

/// Whole-line section labels like `[Verse 1]` or `[Chorus]`.
static MARKER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[^\[\]]*\]$").unwrap());

pub fn is_marker_line(line: &str) -> bool {
    MARKER_LINE.is_match(line.trim())
}

/// Line cues for `lyrics`, ordered by line and non-decreasing in start time.
pub fn build_cues(lyrics: &str, words: &[AlignedWord], options: &MatchOptions) -> Vec<LineCue> {
    order_cues(align(lyrics, words, options).cues)
}

/// Sort matcher output by line and drop anything that would run backwards.
pub fn order_cues(mut cues: Vec<LineCue>) -> Vec<LineCue> {
    cues.sort_by_key(|c| c.line_index);

    let mut out: Vec<LineCue> = Vec::with_capacity(cues.len());
    for mut cue in cues {
        if cue.end_time < cue.start_time {
            cue.end_time = cue.start_time;
        }
        if let Some(prev) = out.last()
            && cue.start_time < prev.start_time
        {
            // Only reachable when the provider stream itself went backwards
            tracing::warn!(
                line_index = cue.line_index,
                start = cue.start_time,
                previous = prev.start_time,
                "dropping out-of-order cue"
            );
            continue;
        }
        out.push(cue);
    }
    out
}

/// What the highlighter runs against.
#[derive(Debug, Clone, PartialEq)]
pub enum Timeline {
    Lines(Vec<LineCue>),
    /// No line could be matched; highlight provider words directly
    Words(Vec<AlignedWord>),
}

impl Timeline {
    #[allow(dead_code)]
    pub fn build(lyrics: &str, words: &[AlignedWord], options: &MatchOptions) -> Self {
        Self::from_cues(build_cues(lyrics, words, options), words)
    }

    /// Line timeline unless `cues` is empty.
    pub fn from_cues(cues: Vec<LineCue>, words: &[AlignedWord]) -> Self {
        if cues.is_empty() {
            tracing::info!("no lyric line matched, using word-level timeline");
            Timeline::Words(words.iter().filter(|w| w.is_well_formed()).cloned().collect())
        } else {
            Timeline::Lines(cues)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Timeline::Lines(c) => c.len(),
            Timeline::Words(w) => w.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display text of the entry at `index`.
    pub fn text(&self, index: usize) -> Option<&str> {
        match self {
            Timeline::Lines(c) => c.get(index).map(|c| c.text.as_str()),
            Timeline::Words(w) => w.get(index).map(|w| w.word.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(word: &str, start: f64, end: f64) -> AlignedWord {
        AlignedWord::new(word, start, end)
    }

    #[test]
    fn test_marker_detection() {
        assert!(is_marker_line("[Chorus]"));
        assert!(is_marker_line("  [Verse 2]  "));
        assert!(is_marker_line("[]"));
        assert!(!is_marker_line("[Chorus] la la"));
        assert!(!is_marker_line("la [la]"));
        assert!(!is_marker_line("(Chorus)"));
        assert!(!is_marker_line("[Verse] [Chorus]"));
        assert!(!is_marker_line("[[Bridge]]"));
    }

    #[test]
    fn test_cues_monotonic() {
        let words = vec![
            w("a", 0.0, 0.5),
            w("b", 0.5, 1.0),
            w("c", 1.0, 1.5),
            w("d", 1.5, 2.0),
        ];
        let cues = build_cues("a b\nc\nd", &words, &MatchOptions::default());
        assert_eq!(cues.len(), 3);
        for pair in cues.windows(2) {
            assert!(pair[0].line_index < pair[1].line_index);
            assert!(pair[0].start_time <= pair[1].start_time);
        }
        for c in &cues {
            assert!(c.start_time <= c.end_time);
        }
    }

    #[test]
    fn test_backwards_provider_stream() {
        // Second line's token is timed before the first line's
        let words = vec![w("a", 2.0, 2.5), w("b", 1.0, 1.5)];
        let cues = build_cues("a\nb", &words, &MatchOptions::default());
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "a");
    }

    #[test]
    fn test_reversed_span_end_raised() {
        // Last token ends before the first one starts
        let words = vec![w("a", 2.0, 2.5), w("b", 1.0, 1.5)];
        let cues = build_cues("a b", &words, &MatchOptions::default());
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].start_time, 2.0);
        assert_eq!(cues[0].end_time, 2.0);
    }

    #[test]
    fn test_timeline_fallback() {
        let words = vec![w("hello", 0.0, 0.5)];
        let t = Timeline::build("something else", &words, &MatchOptions::default());
        assert!(matches!(t, Timeline::Words(ref v) if v.len() == 1));
        assert_eq!(t.text(0), Some("hello"));

        let t = Timeline::build("hello", &words, &MatchOptions::default());
        assert!(matches!(t, Timeline::Lines(ref v) if v.len() == 1));

        let t = Timeline::build("", &[], &MatchOptions::default());
        assert!(t.is_empty());
    }
}
