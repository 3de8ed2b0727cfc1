use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::lyrics::{AlignedWord, LineCue};
use crate::sync::OffsetBackend;

/// A generated song and the provider timings that go with its audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SongRecord {
    pub id: String,
    pub title: String,
    /// Style tag the song was generated with, e.g. "Hip Hop"
    pub style: String,
    pub lyrics: String,
    pub aligned_words: Vec<AlignedWord>,
    /// Unix seconds
    pub created_at: i64,
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let s = Self {
            conn: Connection::open_in_memory().context("open in-memory db")?,
        };
        s.init_schema()?;
        Ok(s)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS songs (
  song_id TEXT PRIMARY KEY,
  title TEXT NOT NULL,
  style TEXT NOT NULL,
  lyrics TEXT NOT NULL,
  aligned_words_json TEXT NOT NULL,
  cues_json TEXT,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_offsets (
  song_id TEXT PRIMARY KEY,
  value_ms INTEGER NOT NULL,
  last_used_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_offsets_last_used ON sync_offsets(last_used_at);
"#,
            )
            .context("init schema")?;
        Ok(())
    }

    /// Insert or replace a song together with its derived cues.
    pub fn upsert_song(&self, song: &SongRecord, cues: &[LineCue], now_unix: i64) -> anyhow::Result<()> {
        let words_json = serde_json::to_string(&song.aligned_words).context("serialize aligned words")?;
        let cues_json = serde_json::to_string(cues).context("serialize cues")?;
        self.conn
            .execute(
                r#"
INSERT INTO songs(song_id, title, style, lyrics, aligned_words_json, cues_json, created_at, updated_at)
VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(song_id) DO UPDATE SET
  title=excluded.title,
  style=excluded.style,
  lyrics=excluded.lyrics,
  aligned_words_json=excluded.aligned_words_json,
  cues_json=excluded.cues_json,
  updated_at=excluded.updated_at
"#,
                params![
                    song.id,
                    song.title,
                    song.style,
                    song.lyrics,
                    words_json,
                    cues_json,
                    song.created_at,
                    now_unix
                ],
            )
            .context("upsert song")?;
        Ok(())
    }

    pub fn get_song(&self, song_id: &str) -> anyhow::Result<Option<SongRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT title, style, lyrics, aligned_words_json, created_at FROM songs WHERE song_id=?1",
                params![song_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()
            .context("query song")?;

        let Some((title, style, lyrics, words_json, created_at)) = row else {
            return Ok(None);
        };
        let aligned_words = serde_json::from_str(&words_json)
            .with_context(|| format!("decode aligned words of {song_id}"))?;
        Ok(Some(SongRecord {
            id: song_id.to_string(),
            title,
            style,
            lyrics,
            aligned_words,
            created_at,
        }))
    }

    /// Replace the lyrics text and the cues derived from it in one statement,
    /// so stored cues never describe older lyrics.
    pub fn update_lyrics(
        &self,
        song_id: &str,
        lyrics: &str,
        cues: &[LineCue],
        now_unix: i64,
    ) -> anyhow::Result<()> {
        let cues_json = serde_json::to_string(cues).context("serialize cues")?;
        let n = self
            .conn
            .execute(
                "UPDATE songs SET lyrics=?2, cues_json=?3, updated_at=?4 WHERE song_id=?1",
                params![song_id, lyrics, cues_json, now_unix],
            )
            .context("update lyrics")?;
        if n == 0 {
            anyhow::bail!("unknown song {song_id}");
        }
        Ok(())
    }

    /// Cached cues, `None` when never computed.
    pub fn get_cues(&self, song_id: &str) -> anyhow::Result<Option<Vec<LineCue>>> {
        let json: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT cues_json FROM songs WHERE song_id=?1",
                params![song_id],
                |row| row.get(0),
            )
            .optional()
            .context("query cues")?;
        match json.flatten() {
            Some(raw) => {
                let cues = serde_json::from_str(&raw)
                    .with_context(|| format!("decode cues of {song_id}"))?;
                Ok(Some(cues))
            }
            None => Ok(None),
        }
    }
}

impl OffsetBackend for Storage {
    fn load_offsets(&self) -> anyhow::Result<Vec<(String, i32)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT song_id, value_ms FROM sync_offsets ORDER BY last_used_at ASC, rowid ASC")
            .context("prepare offsets")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?)))
            .context("query offsets")?
            .filter_map(|r| match r {
                Ok(row) => Some(row),
                Err(e) => {
                    tracing::warn!("skipping unreadable offset row: {e}");
                    None
                }
            })
            .collect();
        Ok(rows)
    }

    fn save_offset(&self, song_id: &str, offset_ms: i32) -> anyhow::Result<()> {
        self.conn
            .execute(
                r#"
INSERT INTO sync_offsets(song_id, value_ms, last_used_at)
VALUES(?1, ?2, ?3)
ON CONFLICT(song_id) DO UPDATE SET
  value_ms=excluded.value_ms,
  last_used_at=excluded.last_used_at
"#,
                params![song_id, offset_ms, next_use_stamp(&self.conn)?],
            )
            .context("save offset")?;
        Ok(())
    }

    fn remove_offset(&self, song_id: &str) -> anyhow::Result<()> {
        self.conn
            .execute("DELETE FROM sync_offsets WHERE song_id=?1", params![song_id])
            .context("remove offset")?;
        Ok(())
    }
}

/// Strictly increasing use counter, so recency order survives same-second writes.
fn next_use_stamp(conn: &Connection) -> anyhow::Result<i64> {
    let max: Option<i64> = conn
        .query_row("SELECT MAX(last_used_at) FROM sync_offsets", [], |row| row.get(0))
        .context("read offset recency")?;
    Ok(max.unwrap_or(0) + 1)
}
