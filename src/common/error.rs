//! Error types for blocktree.
//!
//! Expected outcomes (`NotFound`, `DuplicateKey`, `NoSpace`) and storage
//! failures (`Io`, `Corrupted`, ...) are values. Internal inconsistencies,
//! such as allocating a block that is not on the free list or freeing one
//! twice, are defects and panic instead.

use thiserror::Error;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in blocktree.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying block storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested block does not exist in the store.
    #[error("Block {0} not found")]
    BlockNotFound(u32),

    /// Block cache has no free frames and cannot evict any blocks.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in block cache")]
    NoFreeFrames,

    /// Attempted to drop a block from the cache while it is pinned.
    #[error("Block {0} is pinned")]
    BlockPinned(u32),

    /// The key is absent, or descent reached a node with no children.
    #[error("key not found")]
    NotFound,

    /// The key already exists in the tree.
    #[error("duplicate key")]
    DuplicateKey,

    /// The free list is exhausted.
    #[error("no free blocks left in the tree")]
    NoSpace,

    /// An operation was issued before `attach`.
    #[error("tree is not attached")]
    NotAttached,

    /// A block's stored checksum does not match its contents.
    #[error("checksum mismatch in block {block}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        block: u32,
        stored: u32,
        computed: u32,
    },

    /// A block decoded to something that cannot be a valid node.
    #[error("block {block} is corrupted: {reason}")]
    Corrupted { block: u32, reason: String },

    /// A key, value or block had the wrong width.
    #[error("{what} must be {expected} bytes, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Tree or cache parameters are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Creates a corruption error for `block`.
    pub fn corrupted(block: u32, reason: impl Into<String>) -> Self {
        Error::Corrupted {
            block,
            reason: reason.into(),
        }
    }
}
