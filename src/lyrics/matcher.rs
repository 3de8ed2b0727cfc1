//! Word-to-line matching.
//!
//! The provider times its own tokenization of the sung lyrics; the user then
//! edits the text. For every lyric line we look for the contiguous run of
//! provider tokens that spells the same words, scanning forward only: both
//! streams run left to right, so a token consumed by one line is never offered
//! to an earlier one.

use super::cues::is_marker_line;
use super::models::{AlignedWord, LineCue};
use super::normalize::{line_keys, normalize_word};

/// Upper bound on provider tokens merged into one lyric word.
pub const DEFAULT_MAX_SPLIT_TOKENS: usize = 4;

/// Lines after a resynced one that must not be found before its new position.
const RESYNC_GUARD_LINES: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// How many consecutive tokens may be concatenated to spell one word
    pub max_split_tokens: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_split_tokens: DEFAULT_MAX_SPLIT_TOKENS,
        }
    }
}

/// A line that produced no cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line_index: usize,
    pub text: String,
    /// Most leading words matched at any candidate position; equal to
    /// `total_words` when the line was only found past the lines after it
    pub matched_words: usize,
    pub total_words: usize,
}

impl SkippedLine {
    /// Some but not all words were found in order.
    pub fn is_partial(&self) -> bool {
        self.matched_words > 0 && self.matched_words < self.total_words
    }

    /// All words were found, but only beyond where later lines are sung.
    pub fn is_out_of_place(&self) -> bool {
        self.total_words > 0 && self.matched_words == self.total_words
    }
}

/// Cues in line order plus the lines that could not be placed.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub cues: Vec<LineCue>,
    pub skipped: Vec<SkippedLine>,
}

/// A provider token that survived validation.
#[derive(Debug)]
struct Token<'a> {
    key: String,
    word: &'a AlignedWord,
}

/// Where a line landed in the token stream (`end` is exclusive).
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
}

/// Match every lyric line against the aligned-word stream.
///
/// Never fails: unmatchable lines are reported in [`Alignment::skipped`] and
/// disjoint inputs simply yield no cues.
pub fn align(lyrics: &str, words: &[AlignedWord], options: &MatchOptions) -> Alignment {
    // A provider token may carry a line break ("[Verse]\nHello"); each
    // whitespace-separated piece becomes its own token with the same timing.
    let tokens: Vec<Token<'_>> = words
        .iter()
        .filter(|w| w.is_well_formed())
        .flat_map(|w| {
            w.word
                .split_whitespace()
                .map(normalize_word)
                .filter(|key| !key.is_empty())
                .map(move |key| Token { key, word: w })
        })
        .collect();

    let max_split = options.max_split_tokens.max(1);
    let lines: Vec<(usize, &str, Vec<String>)> = lyrics
        .lines()
        .enumerate()
        .filter_map(|(line_index, raw)| {
            let text = raw.trim();
            if text.is_empty() {
                return None;
            }
            let keys = line_keys(text);
            if keys.is_empty() {
                tracing::debug!(line_index, "line has no matchable words");
                return None;
            }
            Some((line_index, text, keys))
        })
        .collect();

    let mut alignment = Alignment::default();
    let mut cursor = 0usize;

    for (n, (line_index, text, keys)) in lines.iter().enumerate() {
        let line_index = *line_index;
        let found = find_line(&tokens, cursor, keys, max_split).and_then(|span| {
            // A resync jump may not pass over where the following lines are sung
            let mut following = lines[n + 1..].iter().take(RESYNC_GUARD_LINES);
            let overtaken = span.start > cursor
                && following.any(|(_, _, next)| {
                    find_line(&tokens[..span.start], cursor, next, max_split).is_ok()
                });
            if overtaken { Err(keys.len()) } else { Ok(span) }
        });

        match found {
            Ok(span) => {
                let first = tokens[span.start].word;
                let last = tokens[span.end - 1].word;
                alignment.cues.push(LineCue {
                    line_index,
                    text: text.to_string(),
                    start_time: first.start_s,
                    end_time: last.end_s,
                    is_marker: is_marker_line(text),
                });
                cursor = span.end;
            }
            Err(matched_words) => {
                let skipped = SkippedLine {
                    line_index,
                    text: text.to_string(),
                    matched_words,
                    total_words: keys.len(),
                };
                if skipped.is_out_of_place() {
                    tracing::warn!(
                        line_index,
                        "lyric line only found after the lines that follow it, skipping"
                    );
                } else if skipped.is_partial() {
                    tracing::warn!(
                        line_index,
                        matched = matched_words,
                        total = keys.len(),
                        "lyric line only partially matches provider timings"
                    );
                } else {
                    tracing::debug!(line_index, "lyric line not found in provider timings");
                }
                alignment.skipped.push(skipped);
            }
        }
    }

    alignment
}

/// Earliest position at or after `cursor` where the whole line matches.
///
/// On failure returns the best number of leading words matched anywhere.
fn find_line(
    tokens: &[Token<'_>],
    cursor: usize,
    keys: &[String],
    max_split: usize,
) -> Result<Span, usize> {
    let mut best = 0usize;
    for start in cursor..tokens.len() {
        // A line can only start on a token that is a prefix of its first word
        if !keys[0].starts_with(tokens[start].key.as_str()) {
            continue;
        }
        match match_from(tokens, start, keys, max_split) {
            Ok(end) => return Ok(Span { start, end }),
            Err(matched) => best = best.max(matched),
        }
    }
    Err(best)
}

/// Match all `keys` consecutively from `start`; `Ok` carries the end index.
fn match_from(
    tokens: &[Token<'_>],
    start: usize,
    keys: &[String],
    max_split: usize,
) -> Result<usize, usize> {
    let mut pos = start;
    for (matched, key) in keys.iter().enumerate() {
        match match_word(tokens, pos, key, max_split) {
            Some(next) => pos = next,
            None => return Err(matched),
        }
    }
    Ok(pos)
}

/// Concatenate up to `max_split` tokens from `pos` until they spell `key`.
fn match_word(tokens: &[Token<'_>], pos: usize, key: &str, max_split: usize) -> Option<usize> {
    let mut acc = String::new();
    for (used, token) in tokens.get(pos..)?.iter().take(max_split).enumerate() {
        acc.push_str(&token.key);
        if acc == key {
            return Some(pos + used + 1);
        }
        if !key.starts_with(acc.as_str()) {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(word: &str, start: f64, end: f64) -> AlignedWord {
        AlignedWord::new(word, start, end)
    }

    /// Provider stream from space-separated tokens, 0.5 s each.
    fn stream(text: &str) -> Vec<AlignedWord> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, t)| w(t, i as f64 * 0.5, i as f64 * 0.5 + 0.5))
            .collect()
    }

    fn run(lyrics: &str, words: &[AlignedWord]) -> Alignment {
        align(lyrics, words, &MatchOptions::default())
    }

    #[test]
    fn test_hello_world() {
        let words = vec![w("Hello", 0.0, 0.5), w("world", 0.5, 1.0)];
        let a = run("Hello world", &words);
        assert_eq!(a.cues.len(), 1);
        assert_eq!(
            a.cues[0],
            LineCue {
                line_index: 0,
                text: "Hello world".to_string(),
                start_time: 0.0,
                end_time: 1.0,
                is_marker: false,
            }
        );
        assert!(a.skipped.is_empty());
    }

    #[test]
    fn test_split_word() {
        let words = vec![w("I", 0.0, 0.2), w("don", 0.2, 0.4), w("'t", 0.4, 0.5), w("know", 0.5, 1.0)];
        let a = run("I don't know", &words);
        assert_eq!(a.cues.len(), 1);
        assert_eq!(a.cues[0].end_time, 1.0);
    }

    #[test]
    fn test_split_bound() {
        let words = stream("su per ca li fra");
        let opts = MatchOptions { max_split_tokens: 4 };
        assert!(align("supercalifra", &words, &opts).cues.is_empty());
        let opts = MatchOptions { max_split_tokens: 5 };
        assert_eq!(align("supercalifra", &words, &opts).cues.len(), 1);
    }

    #[test]
    fn test_disjoint_input() {
        let words = vec![w("!", 0.0, 0.1)];
        let a = run("completely different content", &words);
        assert!(a.cues.is_empty());
        assert_eq!(a.skipped.len(), 1);
        assert!(!a.skipped[0].is_partial());

        let a = run("completely different content", &stream("nothing alike here at all"));
        assert!(a.cues.is_empty());
    }

    #[test]
    fn test_punctuation_tokens_ignored() {
        let words = vec![w("Hello", 0.0, 0.5), w(",", 0.5, 0.5), w("world", 0.5, 1.0), w("!", 1.0, 1.0)];
        let a = run("Hello, world!", &words);
        assert_eq!(a.cues.len(), 1);
        assert_eq!(a.cues[0].end_time, 1.0);
    }

    #[test]
    fn test_edited_line_skipped_and_resync() {
        let words = stream("first line here second line here third line here");
        let lyrics = "first line here\nsecond verse changed\nthird line here";
        let a = run(lyrics, &words);
        let idx: Vec<usize> = a.cues.iter().map(|c| c.line_index).collect();
        assert_eq!(idx, vec![0, 2]);
        assert_eq!(a.cues[1].start_time, 3.0);

        assert_eq!(a.skipped.len(), 1);
        assert_eq!(a.skipped[0].line_index, 1);
        assert_eq!(a.skipped[0].matched_words, 1);
        assert!(a.skipped[0].is_partial());
    }

    #[test]
    fn test_resync_past_unknown_tokens() {
        // Provider sang an ad-lib that is not in the lyrics
        let words = stream("ooh yeah hello world");
        let a = run("hello world", &words);
        assert_eq!(a.cues.len(), 1);
        assert_eq!(a.cues[0].start_time, 1.0);
    }

    #[test]
    fn test_inserted_line_sung_later_does_not_swallow_song() {
        let words = stream("one a b two c d three e f four g h five i j six k l yeah");
        let lyrics = "one a b\nyeah\ntwo c d\nthree e f\nfour g h\nfive i j\nsix k l";
        let a = run(lyrics, &words);
        let idx: Vec<usize> = a.cues.iter().map(|c| c.line_index).collect();
        assert_eq!(idx, vec![0, 2, 3, 4, 5, 6]);

        assert_eq!(a.skipped.len(), 1);
        assert_eq!(a.skipped[0].text, "yeah");
        assert!(a.skipped[0].is_out_of_place());
        assert!(!a.skipped[0].is_partial());
    }

    #[test]
    fn test_resync_allowed_when_following_lines_are_later() {
        // The jump only passes over tokens no later line needs
        let words = stream("intro noise one a b two c d");
        let a = run("one a b\ntwo c d", &words);
        let starts: Vec<f64> = a.cues.iter().map(|c| c.start_time).collect();
        assert_eq!(starts, vec![1.0, 2.5]);
        assert!(a.skipped.is_empty());
    }

    #[test]
    fn test_first_line_edited_later_lines_found() {
        let words = stream("one two three four five six");
        let a = run("uno dos tres\nfour five six", &words);
        assert_eq!(a.cues.len(), 1);
        assert_eq!(a.cues[0].line_index, 1);
    }

    #[test]
    fn test_cursor_never_rewinds() {
        // Repeated chorus lines consume successive occurrences
        let words = stream("la la la la la la");
        let a = run("la la\nla la\nla la\nla la", &words);
        let starts: Vec<f64> = a.cues.iter().map(|c| c.start_time).collect();
        assert_eq!(starts, vec![0.0, 1.0, 2.0]);
        assert_eq!(a.skipped.len(), 1);
    }

    #[test]
    fn test_empty_lines_keep_index() {
        let words = stream("a b c d");
        let a = run("a b\n\n   \nc d", &words);
        let idx: Vec<usize> = a.cues.iter().map(|c| c.line_index).collect();
        assert_eq!(idx, vec![0, 3]);
        assert!(a.skipped.is_empty());
    }

    #[test]
    fn test_markers() {
        let words = stream("[Chorus] sing it");
        let a = run("[Chorus]\nsing it\n[Outro]", &words);
        assert_eq!(a.cues.len(), 2);
        assert!(a.cues[0].is_marker);
        assert!(!a.cues[1].is_marker);
        // A marker the provider never sang has no timing
        assert_eq!(a.skipped[0].text, "[Outro]");
    }

    #[test]
    fn test_token_spanning_line_break() {
        let words = vec![w("[Verse]\nHello", 1.2, 1.6), w("world", 1.6, 2.0)];
        let a = run("[Verse]\nHello world", &words);
        assert_eq!(a.cues.len(), 2);
        assert!(a.cues[0].is_marker);
        assert_eq!((a.cues[1].start_time, a.cues[1].end_time), (1.2, 2.0));
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let words = vec![
            w("Hello", 0.0, 0.5),
            w("bogus", f64::NAN, 0.7),
            w("world", 0.5, 1.0),
        ];
        let a = run("Hello world", &words);
        assert_eq!(a.cues.len(), 1);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(run("", &stream("a b")).cues.is_empty());
        assert!(run("a b", &[]).cues.is_empty());
    }

    #[test]
    fn test_unicode_lines() {
        let words = vec![
            w("Café", 0.0, 0.4),
            w("😊", 0.4, 0.5),
            w("привет", 0.5, 0.9),
            w("世界", 0.9, 1.2),
        ];
        let lyrics = "Cafe\u{301} 😊 привет, 世界";
        let a = run(lyrics, &words);
        assert_eq!(a.cues.len(), 1);
        assert_eq!(a.cues[0].text, lyrics);
    }

    #[test]
    fn test_completeness_over_generated_lines() {
        // Every line present in order (with every third word split) gets a cue
        // whose tokens spell the line.
        let vocab = ["love", "night", "fire", "dream", "heart", "road", "light", "rain"];
        let mut lyrics = Vec::new();
        let mut words = Vec::new();
        let mut t = 0.0;
        for line in 0..12 {
            let n = 2 + line % 4;
            let line_words: Vec<&str> = (0..n).map(|i| vocab[(line * 3 + i) % vocab.len()]).collect();
            lyrics.push(line_words.join(" "));
            for (i, lw) in line_words.iter().enumerate() {
                if (line + i) % 3 == 0 {
                    let (a, b) = lw.split_at(2);
                    words.push(w(a, t, t + 0.1));
                    words.push(w(b, t + 0.1, t + 0.3));
                } else {
                    words.push(w(lw, t, t + 0.3));
                }
                t += 0.3;
            }
        }
        let a = run(&lyrics.join("\n"), &words);
        assert_eq!(a.cues.len(), lyrics.len());
        for pair in a.cues.windows(2) {
            assert!(pair[0].start_time <= pair[1].start_time);
        }
        for cue in &a.cues {
            assert!(cue.start_time <= cue.end_time);
            let spelled: String = words
                .iter()
                .filter(|x| x.start_s >= cue.start_time && x.end_s <= cue.end_time)
                .map(|x| normalize_word(&x.word))
                .collect();
            assert_eq!(spelled, line_keys(&cue.text).concat());
        }
    }
}
