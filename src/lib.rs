//! blocktree - a disk-backed B-tree over fixed-size blocks.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           blocktree                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/btree/)                  │   │
//! │  │   BTreeIndex: lookup / insert / update / delete          │   │
//! │  │   Superblock + free-list allocator + node codec          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓  BlockStore                      │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Block Cache (buffer/)                       │   │
//! │  │      BlockCache + Frame + LRU replacer + stats           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │        DiskManager + Block + BlockHeader (CRC32)         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockId, Error, config)
//! - [`storage`] - Disk I/O, block formats and the [`BlockStore`] trait
//! - [`buffer`] - Block cache and eviction policy
//! - [`index`] - The B-tree
//!
//! # Quick Start
//! ```no_run
//! use blocktree::{BTreeConfig, BTreeIndex, BlockCache, BlockId, DiskManager, Key, Value};
//!
//! // A 100-block file of 512 byte blocks behind a 16-frame cache.
//! let mut dm = DiskManager::create("my_tree.db", 512).unwrap();
//! dm.extend(100).unwrap();
//! let cache = BlockCache::new(16, dm);
//!
//! let mut tree = BTreeIndex::new(cache, BTreeConfig::new(8, 8));
//! tree.attach(BlockId::SUPERBLOCK, true).unwrap();
//! tree.insert(&Key::from_u64(7), &Value::from_u64(49)).unwrap();
//! tree.detach().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::DEFAULT_BLOCK_SIZE;
pub use common::{BlockId, Error, Result};

pub use buffer::{BlockCache, CacheStats, StatsSnapshot};
pub use index::btree::{BTreeConfig, BTreeIndex, DisplayFormat, Key, SanityReport, Value};
pub use storage::block::{Block, BlockHeader, NodeType};
pub use storage::{BlockStore, DiskManager, MemoryBlockStore};
