//! Per-song sync offset.
//!
//! Offsets are small user corrections for systematic drift between the audio
//! and the provider timings. They are kept in a bounded LRU map and written
//! through to a backend when one is available; a failing backend only costs
//! persistence.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::lyrics::Timed;

/// Symmetric bound on an offset, in milliseconds.
pub const MAX_OFFSET_MS: i32 = 2000;

/// Number of songs whose offsets are remembered.
pub const DEFAULT_OFFSET_CAPACITY: usize = 50;

pub fn clamp_offset(offset_ms: i32) -> i32 {
    offset_ms.clamp(-MAX_OFFSET_MS, MAX_OFFSET_MS)
}

/// Shift every entry by the clamped offset; timestamps never go below zero.
pub fn apply_offset<T: Timed>(timeline: &[T], offset_ms: i32) -> Vec<T> {
    let delta = f64::from(clamp_offset(offset_ms)) / 1000.0;
    timeline.iter().map(|e| e.shifted(delta)).collect()
}

/// Durable home for offsets.
pub trait OffsetBackend {
    /// All stored offsets, least recently used first.
    fn load_offsets(&self) -> anyhow::Result<Vec<(String, i32)>>;
    fn save_offset(&self, song_id: &str, offset_ms: i32) -> anyhow::Result<()>;
    fn remove_offset(&self, song_id: &str) -> anyhow::Result<()>;
}

pub struct OffsetStore {
    cache: LruCache<String, i32>,
    backend: Option<Box<dyn OffsetBackend>>,
}

impl OffsetStore {
    /// In-memory only.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
            backend: None,
        }
    }

    /// Load persisted offsets from `backend` and write through to it.
    pub fn with_backend(capacity: usize, backend: Box<dyn OffsetBackend>) -> Self {
        let mut store = Self::new(capacity);
        match backend.load_offsets() {
            Ok(rows) => {
                for (song_id, offset_ms) in rows {
                    if let Some((evicted, _)) =
                        store.cache.push(song_id.clone(), clamp_offset(offset_ms))
                        && evicted != song_id
                    {
                        // More rows than capacity: drop the stalest
                        if let Err(e) = backend.remove_offset(&evicted) {
                            tracing::warn!(song_id = %evicted, "failed to drop evicted offset: {e:#}");
                        }
                    }
                }
            }
            Err(e) => tracing::warn!("offsets not loaded, continuing without them: {e:#}"),
        }
        store.backend = Some(backend);
        store
    }

    /// Offset for a song, 0 when unknown. Marks the song as recently used in
    /// memory only; the backend's recency follows writes.
    pub fn get(&mut self, song_id: &str) -> i32 {
        self.cache.get(song_id).copied().unwrap_or(0)
    }

    /// Store a clamped offset and return what was stored.
    pub fn set(&mut self, song_id: &str, offset_ms: i32) -> i32 {
        let offset_ms = clamp_offset(offset_ms);
        if let Some((evicted, _)) = self.cache.push(song_id.to_string(), offset_ms)
            && evicted != song_id
        {
            tracing::debug!(song_id = %evicted, "offset evicted");
            if let Some(backend) = &self.backend
                && let Err(e) = backend.remove_offset(&evicted)
            {
                tracing::warn!(song_id = %evicted, "failed to drop evicted offset: {e:#}");
            }
        }
        self.persist(song_id, offset_ms);
        offset_ms
    }

    /// Adjust by `delta_ms` and return the new (clamped) offset.
    pub fn nudge(&mut self, song_id: &str, delta_ms: i32) -> i32 {
        let current = self.get(song_id);
        self.set(song_id, current.saturating_add(delta_ms))
    }

    pub fn reset(&mut self, song_id: &str) {
        self.cache.pop(song_id);
        if let Some(backend) = &self.backend
            && let Err(e) = backend.remove_offset(song_id)
        {
            tracing::warn!(song_id, "failed to remove offset: {e:#}");
        }
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[allow(dead_code)]
    pub fn contains(&self, song_id: &str) -> bool {
        self.cache.contains(song_id)
    }

    fn persist(&self, song_id: &str, offset_ms: i32) {
        if let Some(backend) = &self.backend
            && let Err(e) = backend.save_offset(song_id, offset_ms)
        {
            tracing::warn!(song_id, "offset not persisted: {e:#}");
        }
    }
}
