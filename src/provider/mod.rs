//! Music provider timing data
//!
//! This module provides:
//! - Validation of the provider's timestamped-lyrics payload
//! - An HTTP client that fetches it

pub mod client;

pub use client::ProviderClient;

use serde_json::Value;

use crate::lyrics::AlignedWord;

/// Strict word list from a loosely-typed provider payload.
///
/// Accepts a bare array, `{"alignedWords": [...]}` or the full response
/// envelope `{"data": {"alignedWords": [...]}}`. Entries that are missing
/// fields, carry non-numeric or impossible times are dropped one by one.
/// The result is ordered by start time.
pub fn parse_aligned_words(payload: &Value) -> Vec<AlignedWord> {
    let Some(entries) = word_array(payload) else {
        tracing::warn!("provider payload has no alignedWords array");
        return Vec::new();
    };

    let mut words: Vec<AlignedWord> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value::<AlignedWord>(entry.clone()).ok() {
            Some(word) if word.is_well_formed() => Some(word),
            Some(_) => {
                tracing::debug!(index = i, "dropping aligned word with invalid times");
                None
            }
            None => {
                tracing::debug!(index = i, "dropping malformed aligned word");
                None
            }
        })
        .collect();

    if words.windows(2).any(|p| p[1].start_s < p[0].start_s) {
        tracing::warn!("provider words are out of order, sorting by start time");
        words.sort_by(|a, b| a.start_s.total_cmp(&b.start_s));
    }

    if words.len() < entries.len() {
        tracing::info!(
            kept = words.len(),
            dropped = entries.len() - words.len(),
            "filtered provider timings"
        );
    }
    words
}

fn word_array(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(map) => map
            .get("alignedWords")
            .and_then(Value::as_array)
            .or_else(|| map.get("data").and_then(word_array)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shapes() {
        let entries = json!([{"word": "Hi", "startS": 0.0, "endS": 0.4, "success": true, "palign": 0}]);
        assert_eq!(parse_aligned_words(&entries).len(), 1);
        assert_eq!(parse_aligned_words(&json!({"alignedWords": entries})).len(), 1);
        let envelope = json!({"code": 200, "msg": "success", "data": {"alignedWords": entries, "waveformData": []}});
        assert_eq!(parse_aligned_words(&envelope).len(), 1);
        assert!(parse_aligned_words(&json!({"data": null})).is_empty());
        assert!(parse_aligned_words(&json!("nope")).is_empty());
    }

    #[test]
    fn test_malformed_entries_dropped() {
        let payload = json!([
            {"word": "Hello", "startS": 0.0, "endS": 0.5},
            {"word": "missing-end", "startS": 0.5},
            {"word": "text-time", "startS": "0.5", "endS": 0.9},
            {"startS": 0.5, "endS": 0.9},
            {"word": "reversed", "startS": 2.0, "endS": 1.0},
            {"word": "negative", "startS": -1.0, "endS": 0.2},
            42,
            {"word": "world", "startS": 0.5, "endS": 1.0, "success": false, "palign": 0.8}
        ]);
        let words = parse_aligned_words(&payload);
        let names: Vec<&str> = words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(names, vec!["Hello", "world"]);
        assert!(words[0].success);
        assert!(!words[1].success);
        assert_eq!(words[1].palign, 0.8);
    }

    #[test]
    fn test_sorted_by_start() {
        let payload = json!([
            {"word": "b", "startS": 1.0, "endS": 1.5},
            {"word": "a", "startS": 0.0, "endS": 0.5},
            {"word": "c", "startS": 1.0, "endS": 1.2}
        ]);
        let names: Vec<String> = parse_aligned_words(&payload).into_iter().map(|w| w.word).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
