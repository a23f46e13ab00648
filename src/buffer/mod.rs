//! Block cache.
//!
//! The block cache is the in-memory layer between the B-tree and disk. It
//! manages a fixed pool of frames, each holding one block.
//!
//! # Components
//! - [`BlockCache`] - The cache itself; implements [`BlockStore`](crate::storage::BlockStore)
//! - [`Frame`] - A slot in the cache holding a block + metadata
//! - [`BlockReadGuard`] / [`BlockWriteGuard`] - RAII guards for block access
//! - [`CacheStats`] - Performance statistics
//! - [`replacer`] - Eviction policy

mod block_cache;
mod block_guard;
mod frame;
pub mod replacer;
mod stats;

pub use block_cache::BlockCache;
pub use block_guard::{BlockReadGuard, BlockWriteGuard};
pub use frame::{Frame, FrameId};
pub use stats::{CacheStats, StatsSnapshot};
