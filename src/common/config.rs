//! Configuration constants for blocktree.

/// Default block size in bytes (4KB).
///
/// Matches the OS page size on most systems. Trees may be formatted with
/// any block size between [`MIN_BLOCK_SIZE`] and [`MAX_BLOCK_SIZE`]; the
/// size is recorded in every node header and checked on mount.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Smallest block size a tree can be formatted with.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Largest block size a tree can be formatted with.
pub const MAX_BLOCK_SIZE: usize = 64 * 1024;

/// Default number of frames in a [`BlockCache`](crate::buffer::BlockCache).
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Maximum number of blocks with u32 BlockId.
pub const MAX_BLOCKS: u64 = (u32::MAX as u64) + 1;
