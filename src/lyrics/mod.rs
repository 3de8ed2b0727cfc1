//! Lyrics timing: provider words in, line cues out
//!
//! This module provides:
//! - Timing records shared across the crate
//! - Word normalization for matching
//! - The word-to-line matcher
//! - Line cue construction with a word-level fallback

pub mod cues;
pub mod matcher;
pub mod models;
pub mod normalize;

pub use cues::{Timeline, build_cues};
pub use matcher::MatchOptions;
pub use models::{AlignedWord, LineCue, Timed};
