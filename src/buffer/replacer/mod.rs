//! Eviction policy for the block cache.
//!
//! - [`LruReplacer`] - evicts the least recently used unpinned frame

mod lru;

pub use lru::LruReplacer;
