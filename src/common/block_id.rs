//! Block identifier type.

use std::fmt;

/// Identifies a fixed-size block in a block store.
///
/// Using `u32` allows for 4 billion blocks. Block 0 is always the tree's
/// superblock, which is why a stored link value of `0` can double as the
/// "none" sentinel on disk: no child pointer or free-list link ever
/// refers to the superblock.
///
/// # Example
/// ```
/// use blocktree::BlockId;
///
/// let block_id = BlockId::new(42);
/// assert_eq!(block_id.0, 42);
/// assert_eq!(BlockId::from_link(0), None);
/// assert_eq!(BlockId::from_link(7), Some(BlockId::new(7)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The well-known location of the superblock.
    pub const SUPERBLOCK: BlockId = BlockId(0);

    /// Create a new BlockId.
    #[inline]
    pub fn new(id: u32) -> Self {
        BlockId(id)
    }

    /// Decode an on-disk link field, where `0` means "no block".
    #[inline]
    pub fn from_link(raw: u32) -> Option<Self> {
        (raw != 0).then_some(BlockId(raw))
    }

    /// Encode an optional block as an on-disk link field.
    #[inline]
    pub fn to_link(block: Option<Self>) -> u32 {
        block.map_or(0, |b| b.0)
    }

    /// The id immediately after this one.
    #[inline]
    pub fn next(self) -> Self {
        BlockId(self.0 + 1)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
