//! Comparison keys for lyric words.
//!
//! Provider tokens and user-typed lyrics disagree on case, punctuation and
//! Unicode composition; both sides are folded to the same key before matching.
//! Display text is never normalized here.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Fold a token to its matching key.
///
/// Letters and digits of every script survive, as do combining marks (so
/// Devanagari vowel signs or Hebrew points keep two words apart). Everything
/// else, punctuation and emoji included, is dropped.
pub fn normalize_word(token: &str) -> String {
    let folded: String = token
        .nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || is_combining_mark(*c))
        .collect();
    folded.nfkc().collect()
}

/// Non-empty keys of a line, in order.
pub fn line_keys(line: &str) -> Vec<String> {
    line.split_whitespace()
        .map(normalize_word)
        .filter(|k| !k.is_empty())
        .collect()
}
