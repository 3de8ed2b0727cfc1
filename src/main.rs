mod config;
mod export;
mod lyrics;
mod provider;
mod storage;
mod sync;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::export::SubtitleFormat;
use crate::lyrics::{AlignedWord, Timeline};
use crate::storage::{SongRecord, Storage};
use crate::sync::{AutoScroll, EntryState, OffsetStore};

#[derive(Debug, Parser)]
#[command(name = "lyricsync", version, about = "Line-level lyric timing from provider word timestamps")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a song from a lyrics file and a provider timings JSON file.
    Import {
        song_id: String,
        #[arg(long)]
        lyrics: PathBuf,
        /// Provider payload (bare array or response envelope).
        #[arg(long)]
        words: PathBuf,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        style: String,
    },
    /// Fetch word timings from the provider and store the song.
    Fetch {
        song_id: String,
        #[arg(long)]
        task_id: String,
        #[arg(long)]
        audio_id: String,
        #[arg(long)]
        lyrics: PathBuf,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        style: String,
    },
    /// Replace a song's lyrics text and recompute its cues.
    Edit {
        song_id: String,
        #[arg(long)]
        lyrics: PathBuf,
    },
    /// Print line cues (or provider words when no line matched).
    Cues {
        song_id: String,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show the active entry at a playback position (seconds).
    At { song_id: String, seconds: f64 },
    /// Per-song sync offset.
    ///
    /// Highlighting (`at`, `follow`) reads the lyrics at playback + offset, so a
    /// positive offset shows lines earlier. Exported subtitles are shifted by
    /// +offset, so the same value makes them appear later.
    Offset {
        song_id: String,
        #[command(subcommand)]
        cmd: OffsetCommand,
    },
    /// Write a subtitle file.
    ///
    /// Cue times are shifted by +offset (later for a positive offset), the
    /// opposite direction to how the offset moves highlighting.
    Export {
        song_id: String,
        /// vtt, srt or lrc (defaults to the configured format).
        #[arg(long)]
        format: Option<SubtitleFormat>,
        /// Output file or directory; `-` for stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print lines as they become active, following a simulated playback clock.
    Follow {
        song_id: String,
        /// Start position in seconds.
        #[arg(long, default_value_t = 0.0)]
        from: f64,
    },
}

#[derive(Debug, Subcommand)]
enum OffsetCommand {
    /// Print the current offset.
    Get,
    /// Set the offset in milliseconds (clamped to ±2000).
    Set {
        #[arg(allow_hyphen_values = true)]
        ms: i32,
    },
    /// Adjust the offset by a signed amount of milliseconds.
    Nudge {
        #[arg(allow_hyphen_values = true)]
        ms: i32,
    },
    /// Forget the offset.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;
    let db = Storage::open(&cfg.db_path()).context("open storage")?;
    let options = cfg.sync.match_options();

    match cli.command {
        Command::Import {
            song_id,
            lyrics,
            words,
            title,
            style,
        } => {
            let lyrics = read_text(&lyrics)?;
            let raw = read_text(&words)?;
            let payload: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("parse {}", words.display()))?;
            let aligned_words = provider::parse_aligned_words(&payload);
            store_song(&db, &cfg, song_id, title, style, lyrics, aligned_words)?;
        }
        Command::Fetch {
            song_id,
            task_id,
            audio_id,
            lyrics,
            title,
            style,
        } => {
            let lyrics = read_text(&lyrics)?;
            let mut provider_cfg = cfg.provider.clone();
            provider_cfg.api_key = cfg.api_key();
            let client = provider::ProviderClient::new(&provider_cfg)?;
            let aligned_words = client.fetch_aligned_words(&task_id, &audio_id).await?;
            store_song(&db, &cfg, song_id, title, style, lyrics, aligned_words)?;
        }
        Command::Edit { song_id, lyrics } => {
            let song = require_song(&db, &song_id)?;
            let lyrics = read_text(&lyrics)?;
            let alignment = crate::lyrics::matcher::align(&lyrics, &song.aligned_words, &options);
            for skipped in &alignment.skipped {
                let kind = if skipped.is_out_of_place() {
                    "out of place"
                } else if skipped.is_partial() {
                    "partial"
                } else {
                    "unmatched"
                };
                println!(
                    "line {} {kind} ({}/{} words): {}",
                    skipped.line_index, skipped.matched_words, skipped.total_words, skipped.text
                );
            }
            let cues = crate::lyrics::cues::order_cues(alignment.cues);
            db.update_lyrics(&song_id, &lyrics, &cues, now_unix())?;
            println!("Recomputed {} line cues.", cues.len());
        }
        Command::Cues { song_id, json } => {
            let song = require_song(&db, &song_id)?;
            let timeline = load_timeline(&db, &song, &cfg)?;
            print_timeline(&timeline, json)?;
        }
        Command::At { song_id, seconds } => {
            let song = require_song(&db, &song_id)?;
            let timeline = load_timeline(&db, &song, &cfg)?;
            let offset_ms = offset_store(&cfg).get(&song_id);
            let (index, state) = active(&timeline, seconds, offset_ms, cfg.sync.skip_markers);
            match index.and_then(|i| timeline.text(i).map(|t| (i, t))) {
                Some((i, text)) => println!("#{i} {state:?}: {text}"),
                None => println!("(no lyrics)"),
            }
        }
        Command::Offset { song_id, cmd } => {
            let mut store = offset_store(&cfg);
            let value = match cmd {
                OffsetCommand::Get => store.get(&song_id),
                OffsetCommand::Set { ms } => store.set(&song_id, ms),
                OffsetCommand::Nudge { ms } => store.nudge(&song_id, ms),
                OffsetCommand::Reset => {
                    store.reset(&song_id);
                    0
                }
            };
            println!("{value} ms");
        }
        Command::Export {
            song_id,
            format,
            out,
        } => {
            let song = require_song(&db, &song_id)?;
            let format = format.unwrap_or(cfg.export.format);
            let cues = match load_timeline(&db, &song, &cfg)? {
                Timeline::Lines(cues) => cues,
                Timeline::Words(_) => Vec::new(),
            };
            if cues.is_empty() {
                tracing::warn!(song_id = %song_id, "no line cues, exporting an empty document");
            }
            let offset_ms = offset_store(&cfg).get(&song_id);
            let doc = export::render(format, &cues, offset_ms);

            let created = time::OffsetDateTime::from_unix_timestamp(song.created_at)
                .context("song creation date")?;
            let name = export::filename(&song.style, created.date(), format);
            match out.as_deref() {
                Some(p) if p == Path::new("-") => print!("{doc}"),
                other => {
                    let path = export_path(other, cfg.export.output_dir.as_deref(), &name);
                    std::fs::write(&path, doc.as_bytes())
                        .with_context(|| format!("write {}", path.display()))?;
                    println!("Wrote {} ({})", path.display(), format.mime_type());
                }
            }
        }
        Command::Follow { song_id, from } => {
            let song = require_song(&db, &song_id)?;
            let timeline = load_timeline(&db, &song, &cfg)?;
            let offset_ms = offset_store(&cfg).get(&song_id);
            follow(&timeline, from, offset_ms, &cfg.sync).await;
        }
    }

    Ok(())
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn store_song(
    db: &Storage,
    cfg: &config::Config,
    id: String,
    title: String,
    style: String,
    lyrics: String,
    aligned_words: Vec<AlignedWord>,
) -> anyhow::Result<()> {
    let now = now_unix();
    let created_at = db.get_song(&id)?.map(|s| s.created_at).unwrap_or(now);
    let song = SongRecord {
        id,
        title,
        style,
        lyrics,
        aligned_words,
        created_at,
    };
    let cues = crate::lyrics::build_cues(&song.lyrics, &song.aligned_words, &cfg.sync.match_options());
    db.upsert_song(&song, &cues, now)?;
    println!(
        "Stored {} with {} aligned words and {} line cues.",
        song.id,
        song.aligned_words.len(),
        cues.len()
    );
    Ok(())
}

fn require_song(db: &Storage, song_id: &str) -> anyhow::Result<SongRecord> {
    db.get_song(song_id)?
        .with_context(|| format!("unknown song {song_id}"))
}

/// Cached cues when present, recomputed otherwise; words when no line matched.
fn load_timeline(db: &Storage, song: &SongRecord, cfg: &config::Config) -> anyhow::Result<Timeline> {
    let cues = match db.get_cues(&song.id)? {
        Some(cues) => cues,
        None => {
            let cues = crate::lyrics::build_cues(&song.lyrics, &song.aligned_words, &cfg.sync.match_options());
            db.update_lyrics(&song.id, &song.lyrics, &cues, now_unix())?;
            cues
        }
    };
    Ok(Timeline::from_cues(cues, &song.aligned_words))
}

/// Offsets persist in their own connection; without it they live in memory.
fn offset_store(cfg: &config::Config) -> OffsetStore {
    match Storage::open(&cfg.db_path()) {
        Ok(backend) => OffsetStore::with_backend(cfg.sync.offset_capacity, Box::new(backend)),
        Err(e) => {
            tracing::warn!("offsets will not be persisted: {e:#}");
            OffsetStore::new(cfg.sync.offset_capacity)
        }
    }
}

fn active(timeline: &Timeline, secs: f64, offset_ms: i32, skip_markers: bool) -> (Option<usize>, EntryState) {
    match timeline {
        Timeline::Lines(cues) => {
            let r = sync::find_active(cues, secs, offset_ms, skip_markers);
            (r.index, r.state)
        }
        Timeline::Words(words) => {
            let r = sync::find_active(words, secs, offset_ms, skip_markers);
            (r.index, r.state)
        }
    }
}

fn export_path(out: Option<&Path>, default_dir: Option<&Path>, name: &str) -> PathBuf {
    match out {
        Some(p) if p.is_dir() => p.join(name),
        Some(p) => p.to_path_buf(),
        None => default_dir.unwrap_or(Path::new(".")).join(name),
    }
}

fn print_timeline(timeline: &Timeline, json: bool) -> anyhow::Result<()> {
    match timeline {
        Timeline::Lines(cues) if json => println!("{}", serde_json::to_string_pretty(cues)?),
        Timeline::Words(words) if json => println!("{}", serde_json::to_string_pretty(words)?),
        Timeline::Lines(cues) => {
            for c in cues {
                let marker = if c.is_marker { " (marker)" } else { "" };
                println!(
                    "{:03}  {} --> {}  {}{}",
                    c.line_index,
                    export::format_timestamp(c.start_time, '.'),
                    export::format_timestamp(c.end_time, '.'),
                    c.text,
                    marker
                );
            }
        }
        Timeline::Words(words) => {
            println!("(no line matched, word-level timings)");
            for w in words {
                println!(
                    "{} --> {}  {}",
                    export::format_timestamp(w.start_s, '.'),
                    export::format_timestamp(w.end_s, '.'),
                    w.word
                );
            }
        }
    }
    Ok(())
}

/// Print each line as it becomes current, until the last entry has passed.
async fn follow(timeline: &Timeline, from: f64, offset_ms: i32, cfg: &config::SyncConfig) {
    if timeline.is_empty() {
        println!("(no lyrics)");
        return;
    }
    let last_end = match timeline {
        Timeline::Lines(cues) => cues.iter().map(|c| c.end_time).fold(0.0, f64::max),
        Timeline::Words(words) => words.iter().map(|w| w.end_s).fold(0.0, f64::max),
    };

    let mut scroll = AutoScroll::new(Duration::from_millis(cfg.scroll_cooldown_ms));
    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.tick_ms.max(10)));
    let started = tokio::time::Instant::now();

    loop {
        ticker.tick().await;
        let pos = from + started.elapsed().as_secs_f64();
        let (index, state) = active(timeline, pos, offset_ms, cfg.skip_markers);
        if state == EntryState::Current
            && let Some(i) = scroll.follow(std::time::Instant::now(), index)
            && let Some(text) = timeline.text(i)
        {
            println!("[{}] {}", export::format_timestamp(pos, '.'), text);
        }
        if sync::lookup::adjusted_time(pos, offset_ms) >= last_end {
            break;
        }
    }
}
