//! Playback synchronization: active-entry lookup, offsets and auto-scroll.

pub mod lookup;
pub mod offset;
pub mod scroll;

pub use lookup::{EntryState, find_active};
pub use offset::{OffsetBackend, OffsetStore, apply_offset};
pub use scroll::AutoScroll;
