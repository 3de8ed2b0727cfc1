//! Timing records shared by the matcher, lookup engine and exporter.

use serde::{Deserialize, Serialize};

/// One token as timed by the music provider.
///
/// The serialized form uses the provider's own keys (`startS`, `endS`), so the
/// persisted copy of a song's timings is byte-compatible with the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedWord {
    /// Raw token text, may carry punctuation or be part of a longer word
    pub word: String,
    pub start_s: f64,
    pub end_s: f64,
    /// Provider's own alignment-confidence flag
    #[serde(default = "default_success")]
    pub success: bool,
    /// Provider alignment score
    #[serde(default)]
    pub palign: f64,
}

fn default_success() -> bool {
    true
}

impl AlignedWord {
    pub fn new(word: impl Into<String>, start_s: f64, end_s: f64) -> Self {
        Self {
            word: word.into(),
            start_s,
            end_s,
            success: true,
            palign: 0.0,
        }
    }

    /// Finite, non-negative and not reversed.
    pub fn is_well_formed(&self) -> bool {
        self.start_s.is_finite()
            && self.end_s.is_finite()
            && self.start_s >= 0.0
            && self.start_s <= self.end_s
    }
}

/// Line-granularity timing derived from aligned words and the lyrics text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCue {
    /// 0-based line number in the lyrics text
    pub line_index: usize,
    /// Line content as displayed (trimmed, otherwise verbatim)
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Section label such as `[Chorus]`
    pub is_marker: bool,
}

/// Anything with a playback interval, in seconds.
pub trait Timed {
    fn start(&self) -> f64;
    fn end(&self) -> f64;

    fn is_marker(&self) -> bool {
        false
    }

    /// Copy of `self` moved by `delta` seconds, floored at zero.
    fn shifted(&self, delta: f64) -> Self
    where
        Self: Sized;
}

impl Timed for AlignedWord {
    fn start(&self) -> f64 {
        self.start_s
    }

    fn end(&self) -> f64 {
        self.end_s
    }

    fn shifted(&self, delta: f64) -> Self {
        Self {
            start_s: (self.start_s + delta).max(0.0),
            end_s: (self.end_s + delta).max(0.0),
            ..self.clone()
        }
    }
}

impl Timed for LineCue {
    fn start(&self) -> f64 {
        self.start_time
    }

    fn end(&self) -> f64 {
        self.end_time
    }

    fn is_marker(&self) -> bool {
        self.is_marker
    }

    fn shifted(&self, delta: f64) -> Self {
        Self {
            start_time: (self.start_time + delta).max(0.0),
            end_time: (self.end_time + delta).max(0.0),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_keys() {
        let raw = r#"{"word":"Hello","startS":0.0,"endS":0.5,"success":true,"palign":0}"#;
        let w: AlignedWord = serde_json::from_str(raw).unwrap();
        assert_eq!(w.word, "Hello");
        assert_eq!(w.end_s, 0.5);

        let back = serde_json::to_string(&w).unwrap();
        assert!(back.contains("\"startS\""));
        assert!(back.contains("\"endS\""));
    }

    #[test]
    fn test_well_formed() {
        assert!(AlignedWord::new("a", 0.0, 0.0).is_well_formed());
        assert!(!AlignedWord::new("a", 1.0, 0.5).is_well_formed());
        assert!(!AlignedWord::new("a", -0.1, 0.5).is_well_formed());
        assert!(!AlignedWord::new("a", f64::NAN, 0.5).is_well_formed());
    }

    #[test]
    fn test_shift_floors_at_zero() {
        let w = AlignedWord::new("a", 0.1, 0.3).shifted(-0.2);
        assert_eq!(w.start_s, 0.0);
        assert!((w.end_s - 0.1).abs() < 1e-9);
    }
}
