//! In-memory block store with fault injection.

use std::collections::HashSet;
use std::io;

use parking_lot::Mutex;

use crate::common::{BlockId, Error, Result};
use crate::storage::block::Block;
use crate::storage::BlockStore;

/// A [`BlockStore`] that keeps every block in a `Vec`.
///
/// Besides being fast, it can be told to fail: after a number of
/// successful writes, or whenever a particular block is read. This is how
/// the tests drive the index through mid-operation I/O failures.
///
/// # Example
/// ```
/// use blocktree::storage::{BlockStore, MemoryBlockStore};
/// use blocktree::BlockId;
///
/// let store = MemoryBlockStore::new(512, 16);
/// assert_eq!(store.block_count(), 16);
/// assert!(store.read_block(BlockId::new(3)).unwrap().is_zeroed());
/// ```
pub struct MemoryBlockStore {
    block_size: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    blocks: Vec<Block>,
    writes_left: Option<usize>,
    failing_reads: HashSet<BlockId>,
    allocated: u64,
    deallocated: u64,
}

impl MemoryBlockStore {
    /// Create a store of `block_count` zeroed blocks.
    pub fn new(block_size: usize, block_count: u32) -> Self {
        let blocks = (0..block_count).map(|_| Block::new(block_size)).collect();
        Self {
            block_size,
            inner: Mutex::new(Inner {
                blocks,
                writes_left: None,
                failing_reads: HashSet::new(),
                allocated: 0,
                deallocated: 0,
            }),
        }
    }

    /// Let `n` more writes succeed, then fail every write after that.
    pub fn fail_writes_after(&self, n: usize) {
        self.inner.lock().writes_left = Some(n);
    }

    /// Fail every read of `block_id`.
    pub fn fail_reads_of(&self, block_id: BlockId) {
        self.inner.lock().failing_reads.insert(block_id);
    }

    /// Clear all injected faults.
    pub fn heal(&self) {
        let mut inner = self.inner.lock();
        inner.writes_left = None;
        inner.failing_reads.clear();
    }

    /// Number of `notify_allocated` calls seen.
    pub fn allocations(&self) -> u64 {
        self.inner.lock().allocated
    }

    /// Number of `notify_deallocated` calls seen.
    pub fn deallocations(&self) -> u64 {
        self.inner.lock().deallocated
    }

    fn injected(what: &str, block_id: BlockId) -> Error {
        Error::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("injected {} failure at block {}", what, block_id),
        ))
    }
}

impl BlockStore for MemoryBlockStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u32 {
        self.inner.lock().blocks.len() as u32
    }

    fn read_block(&self, block_id: BlockId) -> Result<Block> {
        let inner = self.inner.lock();
        if inner.failing_reads.contains(&block_id) {
            return Err(Self::injected("read", block_id));
        }
        inner
            .blocks
            .get(block_id.0 as usize)
            .map(|b| Block::from_slice(b.as_slice()))
            .ok_or(Error::BlockNotFound(block_id.0))
    }

    fn write_block(&self, block_id: BlockId, block: &Block) -> Result<()> {
        if block.len() != self.block_size {
            return Err(Error::SizeMismatch {
                what: "block",
                expected: self.block_size,
                actual: block.len(),
            });
        }

        let mut inner = self.inner.lock();
        match inner.writes_left {
            Some(0) => return Err(Self::injected("write", block_id)),
            Some(ref mut n) => *n -= 1,
            None => {}
        }
        let slot = inner
            .blocks
            .get_mut(block_id.0 as usize)
            .ok_or(Error::BlockNotFound(block_id.0))?;
        slot.as_mut_slice().copy_from_slice(block.as_slice());
        Ok(())
    }

    fn notify_allocated(&self, _block_id: BlockId) {
        self.inner.lock().allocated += 1;
    }

    fn notify_deallocated(&self, _block_id: BlockId) {
        self.inner.lock().deallocated += 1;
    }

    fn grow(&self, additional: u32) -> Result<u32> {
        let mut inner = self.inner.lock();
        for _ in 0..additional {
            inner.blocks.push(Block::new(self.block_size));
        }
        Ok(inner.blocks.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let store = MemoryBlockStore::new(128, 4);
        let mut block = Block::new(128);
        block.as_mut_slice()[10] = 7;

        store.write_block(BlockId::new(2), &block).unwrap();
        assert_eq!(store.read_block(BlockId::new(2)).unwrap().as_slice()[10], 7);
    }

    #[test]
    fn test_out_of_range() {
        let store = MemoryBlockStore::new(128, 4);
        assert!(matches!(
            store.read_block(BlockId::new(4)),
            Err(Error::BlockNotFound(4))
        ));
    }

    #[test]
    fn test_fail_writes_after() {
        let store = MemoryBlockStore::new(128, 4);
        let block = Block::new(128);
        store.fail_writes_after(1);

        assert!(store.write_block(BlockId::new(0), &block).is_ok());
        assert!(matches!(
            store.write_block(BlockId::new(1), &block),
            Err(Error::Io(_))
        ));

        store.heal();
        assert!(store.write_block(BlockId::new(1), &block).is_ok());
    }

    #[test]
    fn test_fail_reads_of() {
        let store = MemoryBlockStore::new(128, 4);
        store.fail_reads_of(BlockId::new(3));

        assert!(store.read_block(BlockId::new(2)).is_ok());
        assert!(matches!(store.read_block(BlockId::new(3)), Err(Error::Io(_))));
    }

    #[test]
    fn test_grow_and_notifications() {
        let store = MemoryBlockStore::new(128, 2);
        assert_eq!(store.grow(3).unwrap(), 5);
        assert_eq!(store.block_count(), 5);

        store.notify_allocated(BlockId::new(1));
        store.notify_deallocated(BlockId::new(1));
        assert_eq!(store.allocations(), 1);
        assert_eq!(store.deallocations(), 1);
    }
}
