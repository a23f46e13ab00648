//! Block Cache - the caching layer between the index and disk.
//!
//! The [`BlockCache`] provides:
//! - Block caching between disk and memory
//! - Pin-based reference counting
//! - Automatic dirty block write-back
//! - LRU eviction
//! - The [`BlockStore`] capability the B-tree is written against

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::buffer::frame::{Frame, FrameId};
use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BlockReadGuard, BlockWriteGuard, CacheStats};
use crate::common::{BlockId, Error, Result};
use crate::storage::block::Block;
use crate::storage::{BlockStore, DiskManager};

/// Manages a pool of frames caching disk blocks.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                        BlockCache                           │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ block_table  │  │        frames: Vec<Frame>         │   │
/// │  │BlockId → Fid │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ LruReplacer  │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `block_table`: `RwLock` (many readers, few writers)
/// - `free_list`: `Mutex` (always modified)
/// - `replacer`: `Mutex` (internal state changes on access)
/// - `disk_manager`: `Mutex` (single-threaded I/O)
/// - `frames`: No lock (fixed size, each Frame has internal locks)
/// - `stats`: No lock (all atomic counters)
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("test.db", 512)?;
/// let cache = BlockCache::new(16, dm);
///
/// let mut guard = cache.new_block()?;
/// guard.as_mut_slice()[0] = 0xAB;
/// // guard drops: block marked dirty, unpinned
/// ```
pub struct BlockCache {
    frames: Vec<Frame>,
    block_table: RwLock<HashMap<BlockId, FrameId>>,
    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,
    replacer: Mutex<LruReplacer>,
    disk_manager: Mutex<DiskManager>,
    stats: CacheStats,
    block_size: usize,
}

impl BlockCache {
    /// Create a new block cache of `pool_size` frames over `disk_manager`.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let block_size = disk_manager.block_size();
        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new(block_size)).collect();
        let free_list: Vec<FrameId> = (0..pool_size).map(FrameId::new).collect();

        Self {
            frames,
            block_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: CacheStats::new(),
            block_size,
        }
    }

    // ========================================================================
    // Public API: Fetch blocks
    // ========================================================================

    /// Fetch a block for reading (shared access).
    ///
    /// # Errors
    /// - `Error::BlockNotFound` if the block doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_block_read(&self, block_id: BlockId) -> Result<BlockReadGuard<'_>> {
        let frame_id = self.fetch_internal(block_id, true)?;
        let lock = self.frames[frame_id.0].block();

        Ok(BlockReadGuard::new(self, frame_id, block_id, lock))
    }

    /// Fetch a block for writing (exclusive access).
    ///
    /// The block is marked dirty when the guard drops.
    pub fn fetch_block_write(&self, block_id: BlockId) -> Result<BlockWriteGuard<'_>> {
        let frame_id = self.fetch_internal(block_id, true)?;
        let lock = self.frames[frame_id.0].block_mut();

        Ok(BlockWriteGuard::new(self, frame_id, block_id, lock))
    }

    // ========================================================================
    // Public API: Create and delete blocks
    // ========================================================================

    /// Append a new block to the file and load it into the cache.
    pub fn new_block(&self) -> Result<BlockWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let block_id = match self.disk_manager.lock().allocate_block() {
            Ok(id) => id,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0];
        frame.block_mut().reset();
        self.install(frame_id, block_id);

        let lock = frame.block_mut();
        Ok(BlockWriteGuard::new(self, frame_id, block_id, lock))
    }

    /// Drop a block from the cache without writing it back.
    ///
    /// # Errors
    /// - `Error::BlockPinned` if the block is still pinned
    pub fn delete_block(&self, block_id: BlockId) -> Result<()> {
        let mut table = self.block_table.write();

        let frame_id = match table.get(&block_id) {
            Some(&fid) => fid,
            None => return Ok(()),
        };

        let frame = &self.frames[frame_id.0];
        if frame.is_pinned() {
            return Err(Error::BlockPinned(block_id.0));
        }

        table.remove(&block_id);
        drop(table);

        frame.set_block_id(None);
        frame.clear_dirty();
        self.replacer.lock().remove(frame_id);
        self.free_list.lock().push(frame_id);

        Ok(())
    }

    // ========================================================================
    // Public API: Flush blocks
    // ========================================================================

    /// Flush a specific block to disk if it's dirty.
    pub fn flush_block(&self, block_id: BlockId) -> Result<()> {
        let frame_id = match self.block_table.read().get(&block_id) {
            Some(&fid) => fid,
            None => return Ok(()),
        };

        self.flush_frame(frame_id, block_id)
    }

    /// Flush all dirty blocks to disk.
    pub fn flush_all_blocks(&self) -> Result<()> {
        let resident: Vec<(BlockId, FrameId)> = {
            let table = self.block_table.read();
            table.iter().map(|(&bid, &fid)| (bid, fid)).collect()
        };

        for (block_id, frame_id) in resident {
            self.flush_frame(frame_id, block_id)?;
        }

        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of blocks resident in the cache.
    pub fn resident_count(&self) -> usize {
        self.block_table.read().len()
    }

    /// Pin count of a resident block, or `None` if it is not cached.
    pub fn pin_count(&self, block_id: BlockId) -> Option<u32> {
        let fid = *self.block_table.read().get(&block_id)?;
        Some(self.frames[fid.0].pin_count())
    }

    // ========================================================================
    // Internal: Called by guards on drop
    // ========================================================================

    pub(crate) fn unpin_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        if frame.unpin() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    /// Bring a block into a pinned frame. With `load == false` the caller
    /// is about to overwrite the whole block, so the disk read is skipped.
    fn fetch_internal(&self, block_id: BlockId, load: bool) -> Result<FrameId> {
        {
            let table = self.block_table.read();
            if let Some(&frame_id) = table.get(&block_id) {
                self.frames[frame_id.0].pin();
                self.touch(frame_id);
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(frame_id);
            }
        }

        self.handle_cache_miss(block_id, load)
    }

    fn handle_cache_miss(&self, block_id: BlockId, load: bool) -> Result<FrameId> {
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        trace!(block = block_id.0, load, "block cache miss");

        let frame_id = self.get_free_frame()?;

        let data = {
            let mut dm = self.disk_manager.lock();
            if load {
                dm.read_block(block_id).map(Some)
            } else if block_id.0 < dm.block_count() {
                Ok(None)
            } else {
                Err(Error::BlockNotFound(block_id.0))
            }
        };
        let data = match data {
            Ok(data) => data,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0];
        {
            let mut block = frame.block_mut();
            match data {
                Some(data) => {
                    block.as_mut_slice().copy_from_slice(data.as_slice());
                    self.stats.blocks_read.fetch_add(1, Ordering::Relaxed);
                }
                None => block.reset(),
            }
        }

        self.install(frame_id, block_id);
        Ok(frame_id)
    }

    /// Map `block_id` to a freshly filled frame and pin it.
    fn install(&self, frame_id: FrameId, block_id: BlockId) {
        let frame = &self.frames[frame_id.0];
        frame.set_block_id(Some(block_id));
        frame.pin();

        self.block_table.write().insert(block_id, frame_id);
        self.touch(frame_id);
    }

    fn touch(&self, frame_id: FrameId) {
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_block()
    }

    fn evict_block(&self) -> Result<FrameId> {
        let frame_id = self.replacer.lock().evict().ok_or(Error::NoFreeFrames)?;

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        let old_block_id = frame.block_id();
        trace!(frame = frame_id.0, block = ?old_block_id, "evicting frame");

        if let Some(bid) = old_block_id {
            if frame.is_dirty() {
                if let Err(e) = self.flush_frame(frame_id, bid) {
                    // Still resident and dirty; let the replacer offer it again.
                    let mut replacer = self.replacer.lock();
                    replacer.record_access(frame_id);
                    replacer.set_evictable(frame_id, true);
                    return Err(e);
                }
            }
            self.block_table.write().remove(&bid);
        }

        frame.clear_dirty();
        frame.set_block_id(None);

        Ok(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId, block_id: BlockId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.is_dirty() {
            let block = frame.block();
            self.disk_manager.lock().write_block(block_id, &block)?;
            drop(block);

            frame.clear_dirty();
            self.stats.blocks_written.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }
}

impl BlockStore for BlockCache {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u32 {
        self.disk_manager.lock().block_count()
    }

    fn read_block(&self, block_id: BlockId) -> Result<Block> {
        let guard = self.fetch_block_read(block_id)?;
        Ok(Block::from_slice(guard.as_slice()))
    }

    fn write_block(&self, block_id: BlockId, block: &Block) -> Result<()> {
        if block.len() != self.block_size {
            return Err(Error::SizeMismatch {
                what: "block",
                expected: self.block_size,
                actual: block.len(),
            });
        }

        let frame_id = self.fetch_internal(block_id, false)?;
        let mut guard =
            BlockWriteGuard::new(self, frame_id, block_id, self.frames[frame_id.0].block_mut());
        guard.as_mut_slice().copy_from_slice(block.as_slice());
        Ok(())
    }

    fn notify_allocated(&self, block_id: BlockId) {
        self.stats.blocks_allocated.fetch_add(1, Ordering::Relaxed);
        trace!(block = block_id.0, "block allocated by index");
    }

    fn notify_deallocated(&self, block_id: BlockId) {
        self.stats
            .blocks_deallocated
            .fetch_add(1, Ordering::Relaxed);
        trace!(block = block_id.0, "block deallocated by index");
    }

    fn flush(&self) -> Result<()> {
        self.flush_all_blocks()
    }

    fn grow(&self, additional: u32) -> Result<u32> {
        self.disk_manager.lock().extend(additional)
    }
}
