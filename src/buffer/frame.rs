//! Frame - a slot in the block cache.
//!
//! A [`Frame`] holds one [`Block`] plus the metadata needed for caching:
//! which block is loaded, a pin count, and a dirty flag.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::BlockId;
use crate::storage::block::Block;

/// Identifies a frame in the block cache.
///
/// Frames live in a `Vec<Frame>`, so the id is a plain index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

/// A frame in the block cache.
///
/// # Thread Safety
/// All fields use interior mutability:
/// - `block`: `RwLock` for read/write synchronization
/// - `block_id`: `Mutex` for safe updates
/// - `pin_count`: `AtomicU32` for lock-free reference counting
/// - `is_dirty`: `AtomicBool` for lock-free dirty tracking
pub struct Frame {
    block: RwLock<Block>,
    block_id: Mutex<Option<BlockId>>,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create a new empty frame holding a zeroed block of `block_size` bytes.
    pub fn new(block_size: usize) -> Self {
        Self {
            block: RwLock::new(Block::new(block_size)),
            block_id: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Acquire read lock on the block.
    #[inline]
    pub fn block(&self) -> RwLockReadGuard<'_, Block> {
        self.block.read()
    }

    /// Acquire write lock on the block.
    #[inline]
    pub fn block_mut(&self) -> RwLockWriteGuard<'_, Block> {
        self.block.write()
    }

    /// The id of the loaded block, if any.
    #[inline]
    pub fn block_id(&self) -> Option<BlockId> {
        *self.block_id.lock()
    }

    #[inline]
    pub fn set_block_id(&self, block_id: Option<BlockId>) {
        *self.block_id.lock() = block_id;
    }

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    /// Check if the frame can be evicted.
    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.block_id().is_some() && !self.is_pinned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_new() {
        let frame = Frame::new(512);
        assert!(!frame.is_pinned());
        assert!(!frame.is_dirty());
        assert_eq!(frame.block_id(), None);
        assert_eq!(frame.block().len(), 512);
    }

    #[test]
    fn test_frame_pin_unpin() {
        let frame = Frame::new(512);

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.unpin(), 1);
        assert!(frame.is_pinned());
        assert_eq!(frame.unpin(), 0);
        assert!(!frame.is_pinned());
    }

    #[test]
    #[should_panic(expected = "pin count underflow")]
    fn test_unpin_underflow_panics() {
        Frame::new(64).unpin();
    }

    #[test]
    fn test_evictable_requires_loaded_unpinned_block() {
        let frame = Frame::new(64);
        assert!(!frame.is_evictable());

        frame.set_block_id(Some(BlockId::new(3)));
        assert!(frame.is_evictable());

        frame.pin();
        assert!(!frame.is_evictable());
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(42)), "Frame(42)");
    }
}
