//! Block - the fundamental unit of storage.
//!
//! A [`Block`] is a raw byte array of the store's block size. It is the
//! unit of I/O between the disk manager, the block cache and the node
//! codec.

use super::block_header::BlockHeader;

/// A block of data.
///
/// Unlike a fixed page type, the length is chosen when the store is
/// created (trees are commonly formatted with 512 byte or 4KB blocks),
/// so the bytes live on the heap.
///
/// # Clone Implementation
/// `Block` does NOT implement `Clone` in production code; copies go through
/// [`Block::from_slice`] so they stay visible at call sites.
/// A `#[cfg(test)]` Clone is provided for tests.
///
/// # Example
/// ```
/// use blocktree::storage::block::Block;
///
/// let mut block = Block::new(512);
/// block.as_mut_slice()[0] = 0xFF;
/// assert_eq!(block.as_slice()[0], 0xFF);
/// assert_eq!(block.len(), 512);
/// ```
pub struct Block {
    data: Box<[u8]>,
}

impl Block {
    /// Create a new zeroed block of `size` bytes.
    #[inline]
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Create a block holding a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec().into_boxed_slice(),
        }
    }

    /// Get immutable slice of block data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of block data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire block.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Size of the block in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the block holds zero bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether every byte is zero (a block that was never written).
    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Read the block header.
    pub fn header(&self) -> BlockHeader {
        BlockHeader::from_bytes(&self.data)
    }

    /// Write a block header.
    pub fn set_header(&mut self, header: &BlockHeader) {
        header.write_to(&mut self.data);
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the block are complete.
    pub fn update_checksum(&mut self) {
        let checksum = BlockHeader::compute_checksum(&self.data);
        self.data[BlockHeader::OFFSET_CHECKSUM..BlockHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// Verify the block checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Block {
    fn clone(&self) -> Self {
        Block::from_slice(&self.data)
    }
}
