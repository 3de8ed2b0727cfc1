//! Subtitle export
//!
//! Renders line cues as timed text:
//! - WebVTT (default), `HH:MM:SS.mmm --> HH:MM:SS.mmm`
//! - SRT, numbered blocks with `HH:MM:SS,mmm`
//! - LRC, `[mm:ss.xx]` prefixed lines
//!
//! Section markers never reach the output and the offset is applied before
//! formatting, so timestamps are never negative.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::lyrics::LineCue;
use crate::sync::apply_offset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    #[default]
    Vtt,
    Srt,
    Lrc,
}

impl SubtitleFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Lrc => "lrc",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            SubtitleFormat::Vtt => "text/vtt",
            SubtitleFormat::Srt => "application/x-subrip",
            SubtitleFormat::Lrc => "text/plain",
        }
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vtt" | "webvtt" => Ok(SubtitleFormat::Vtt),
            "srt" => Ok(SubtitleFormat::Srt),
            "lrc" => Ok(SubtitleFormat::Lrc),
            other => anyhow::bail!("unknown subtitle format: {other}"),
        }
    }
}

/// Render `cues` in `format` with the offset applied.
pub fn render(format: SubtitleFormat, cues: &[LineCue], offset_ms: i32) -> String {
    let shifted: Vec<LineCue> = apply_offset(cues, offset_ms)
        .into_iter()
        .filter(|c| !c.is_marker)
        .collect();
    match format {
        SubtitleFormat::Vtt => render_vtt(&shifted),
        SubtitleFormat::Srt => render_srt(&shifted),
        SubtitleFormat::Lrc => render_lrc(&shifted),
    }
}

/// WebVTT document for `cues`. An empty list gives a header-only document.
pub fn generate(cues: &[LineCue], offset_ms: i32) -> String {
    render(SubtitleFormat::Vtt, cues, offset_ms)
}

fn render_vtt(cues: &[LineCue]) -> String {
    let mut out = String::from("WEBVTT\n");
    for cue in cues {
        let _ = write!(
            out,
            "\n{} --> {}\n{}\n",
            format_timestamp(cue.start_time, '.'),
            format_timestamp(cue.end_time, '.'),
            escape_vtt(&cue.text)
        );
    }
    out
}

fn render_srt(cues: &[LineCue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n",
            i + 1,
            format_timestamp(cue.start_time, ','),
            format_timestamp(cue.end_time, ','),
            cue.text
        );
    }
    out
}

fn render_lrc(cues: &[LineCue]) -> String {
    let mut out = String::new();
    for cue in cues {
        let cs = (cue.start_time.max(0.0) * 100.0).round() as u64;
        let _ = writeln!(
            out,
            "[{:02}:{:02}.{:02}]{}",
            cs / 6000,
            (cs / 100) % 60,
            cs % 100,
            cue.text
        );
    }
    out
}

/// `HH:MM:SS.mmm` (or with `,` for SRT), rounded to the millisecond.
pub fn format_timestamp(seconds: f64, separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{h:02}:{m:02}:{s:02}{separator}{ms:03}")
}

/// Cue text may not contain `-->` or raw markup.
fn escape_vtt(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// `song-{style}-{YYYY-MM-DD}.{ext}` with the style reduced to lowercase
/// alphanumerics joined by single hyphens.
pub fn filename(style: &str, date: time::Date, format: SubtitleFormat) -> String {
    let mut slug = String::with_capacity(style.len());
    for c in style.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');

    let day = format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    );
    if slug.is_empty() {
        format!("song-{day}.{}", format.extension())
    } else {
        format!("song-{slug}-{day}.{}", format.extension())
    }
}
