//! The block-store capability the B-tree runs on.
//!
//! The index never touches files or frames directly: every node read and
//! write goes through a [`BlockStore`]. [`BlockCache`](crate::buffer::BlockCache)
//! is the production implementation; [`MemoryBlockStore`](super::MemoryBlockStore)
//! backs unit tests.

use std::sync::Arc;

use crate::common::{BlockId, Result};
use crate::storage::block::Block;

/// Durable, fixed-size block storage.
///
/// Methods take `&self`: implementations synchronize internally, the same
/// way the block cache guards its frames and disk manager.
pub trait BlockStore {
    /// Size of every block in bytes.
    fn block_size(&self) -> usize;

    /// Number of addressable blocks.
    fn block_count(&self) -> u32;

    /// Read a copy of a block.
    fn read_block(&self, block_id: BlockId) -> Result<Block>;

    /// Overwrite a block.
    fn write_block(&self, block_id: BlockId, block: &Block) -> Result<()>;

    /// Bookkeeping hook: `block_id` was handed out by the tree's allocator.
    fn notify_allocated(&self, _block_id: BlockId) {}

    /// Bookkeeping hook: `block_id` was returned to the tree's free list.
    fn notify_deallocated(&self, _block_id: BlockId) {}

    /// Make every block written so far durable.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Append `additional` zeroed blocks, returning the new block count.
    fn grow(&self, additional: u32) -> Result<u32>;
}

impl<S: BlockStore + ?Sized> BlockStore for Arc<S> {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn block_count(&self) -> u32 {
        (**self).block_count()
    }

    fn read_block(&self, block_id: BlockId) -> Result<Block> {
        (**self).read_block(block_id)
    }

    fn write_block(&self, block_id: BlockId, block: &Block) -> Result<()> {
        (**self).write_block(block_id, block)
    }

    fn notify_allocated(&self, block_id: BlockId) {
        (**self).notify_allocated(block_id)
    }

    fn notify_deallocated(&self, block_id: BlockId) {
        (**self).notify_deallocated(block_id)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn grow(&self, additional: u32) -> Result<u32> {
        (**self).grow(additional)
    }
}
