//! RAII guards for block access.
//!
//! - [`BlockReadGuard`] - Shared read access (multiple allowed)
//! - [`BlockWriteGuard`] - Exclusive write access (marks the frame dirty)
//!
//! Both guards unpin the block when dropped.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::block_cache::BlockCache;
use super::frame::FrameId;
use crate::common::BlockId;
use crate::storage::block::Block;

/// Guard for read-only block access.
///
/// # Example
/// ```ignore
/// let guard = cache.fetch_block_read(block_id)?;
/// let data = guard.as_slice();
/// // guard drops here, block unpinned
/// ```
pub struct BlockReadGuard<'a> {
    cache: &'a BlockCache,
    frame_id: FrameId,
    block_id: BlockId,
    lock: RwLockReadGuard<'a, Block>,
}

impl<'a> BlockReadGuard<'a> {
    pub(crate) fn new(
        cache: &'a BlockCache,
        frame_id: FrameId,
        block_id: BlockId,
        lock: RwLockReadGuard<'a, Block>,
    ) -> Self {
        Self {
            cache,
            frame_id,
            block_id,
            lock,
        }
    }

    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }
}

impl Deref for BlockReadGuard<'_> {
    type Target = Block;

    #[inline]
    fn deref(&self) -> &Block {
        &self.lock
    }
}

impl Drop for BlockReadGuard<'_> {
    fn drop(&mut self) {
        self.cache.unpin_internal(self.frame_id, false);
    }
}

/// Guard for exclusive write access to a block.
///
/// The frame is marked dirty and unpinned when the guard is dropped.
pub struct BlockWriteGuard<'a> {
    cache: &'a BlockCache,
    frame_id: FrameId,
    block_id: BlockId,
    lock: RwLockWriteGuard<'a, Block>,
}

impl<'a> BlockWriteGuard<'a> {
    pub(crate) fn new(
        cache: &'a BlockCache,
        frame_id: FrameId,
        block_id: BlockId,
        lock: RwLockWriteGuard<'a, Block>,
    ) -> Self {
        Self {
            cache,
            frame_id,
            block_id,
            lock,
        }
    }

    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }
}

impl Deref for BlockWriteGuard<'_> {
    type Target = Block;

    #[inline]
    fn deref(&self) -> &Block {
        &self.lock
    }
}

impl DerefMut for BlockWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Block {
        &mut self.lock
    }
}

impl Drop for BlockWriteGuard<'_> {
    fn drop(&mut self) {
        self.cache.unpin_internal(self.frame_id, true);
    }
}
