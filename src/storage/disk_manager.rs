//! Disk Manager - low-level file I/O for blocks.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing blocks
//! - Appending new blocks
//! - Managing the database file

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::common::config::{MAX_BLOCKS, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::common::{BlockId, Error, Result};
use crate::storage::block::Block;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// The database is stored as a single file with blocks laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Block 0 │ Block 1 │ Block 2 │  ...    │ Block N │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0       B        2B      ...      N×B
/// ```
///
/// Block N is located at file offset `N × block_size`. The block size is
/// not stored in the file header; callers pass the size the tree was
/// formatted with, and the tree verifies it against its superblock.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BlockCache` is responsible
/// for serializing access to the disk manager.
///
/// # Durability
/// All writes are followed by `fsync()`.
pub struct DiskManager {
    file: File,
    block_size: usize,
    /// Number of blocks in the file.
    block_count: u32,
}

impl DiskManager {
    /// Create a new, empty database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists, cannot be created, or
    /// `block_size` is outside the supported range.
    pub fn create<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        Self::check_block_size(block_size)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        debug!(path = %path.as_ref().display(), block_size, "created database file");

        Ok(Self {
            file,
            block_size,
            block_count: 0,
        })
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or its
    /// length is not a multiple of `block_size`.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        Self::check_block_size(block_size)?;
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size % block_size as u64 != 0 {
            return Err(Error::InvalidConfig(format!(
                "file size {} is not a multiple of block size {}",
                file_size, block_size
            )));
        }
        let block_count = (file_size / block_size as u64) as u32;

        Ok(Self {
            file,
            block_size,
            block_count,
        })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, block_size)
        } else {
            Self::create(path, block_size)
        }
    }

    /// Read a block from disk.
    ///
    /// # Errors
    /// Returns `Error::BlockNotFound` if the block doesn't exist.
    pub fn read_block(&mut self, block_id: BlockId) -> Result<Block> {
        if block_id.0 >= self.block_count {
            return Err(Error::BlockNotFound(block_id.0));
        }

        self.file.seek(SeekFrom::Start(self.offset_of(block_id)))?;

        let mut block = Block::new(self.block_size);
        self.file.read_exact(block.as_mut_slice())?;

        Ok(block)
    }

    /// Write a block to disk.
    ///
    /// # Errors
    /// Returns `Error::BlockNotFound` if the block hasn't been allocated, and
    /// `Error::SizeMismatch` if `block` is not exactly one block long.
    pub fn write_block(&mut self, block_id: BlockId, block: &Block) -> Result<()> {
        if block_id.0 >= self.block_count {
            return Err(Error::BlockNotFound(block_id.0));
        }
        if block.len() != self.block_size {
            return Err(Error::SizeMismatch {
                what: "block",
                expected: self.block_size,
                actual: block.len(),
            });
        }

        self.file.seek(SeekFrom::Start(self.offset_of(block_id)))?;
        self.file.write_all(block.as_slice())?;
        self.file.sync_all()?;

        Ok(())
    }

    /// Append a zeroed block to the file and return its id.
    pub fn allocate_block(&mut self) -> Result<BlockId> {
        let block_id = BlockId::new(self.block_count);

        self.file.seek(SeekFrom::Start(self.offset_of(block_id)))?;
        self.file.write_all(&vec![0u8; self.block_size])?;
        self.file.sync_all()?;

        self.block_count += 1;
        Ok(block_id)
    }

    /// Append `count` zeroed blocks, returning the new block count.
    pub fn extend(&mut self, count: u32) -> Result<u32> {
        if count == 0 {
            return Ok(self.block_count);
        }
        let new_count = self.block_count as u64 + count as u64;
        if new_count >= MAX_BLOCKS {
            return Err(Error::InvalidConfig(format!(
                "cannot grow past {} blocks",
                MAX_BLOCKS - 1
            )));
        }
        let new_count = new_count as u32;
        self.file
            .set_len(new_count as u64 * self.block_size as u64)?;
        self.file.sync_all()?;

        debug!(from = self.block_count, to = new_count, "extended database file");
        self.block_count = new_count;
        Ok(new_count)
    }

    /// Get the number of blocks in the database.
    #[inline]
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Size of every block in bytes.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.block_count as u64) * (self.block_size as u64)
    }

    fn offset_of(&self, block_id: BlockId) -> u64 {
        (block_id.0 as u64) * (self.block_size as u64)
    }

    fn check_block_size(block_size: usize) -> Result<()> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(Error::InvalidConfig(format!(
                "block size {} outside {}..={}",
                block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let dm = DiskManager::create(&path, 512).unwrap();
        assert_eq!(dm.block_count(), 0);
        assert_eq!(dm.file_size(), 0);
        assert_eq!(dm.block_size(), 512);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskManager::create(&path, 512).unwrap();
        assert!(DiskManager::create(&path, 512).is_err());
    }

    #[test]
    fn test_rejects_tiny_block_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        assert!(matches!(
            DiskManager::create(&path, 8),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_allocate_and_read_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path, 512).unwrap();

        let block_id = dm.allocate_block().unwrap();
        assert_eq!(block_id, BlockId::new(0));
        assert_eq!(dm.block_count(), 1);

        let block = dm.read_block(block_id).unwrap();
        assert!(block.is_zeroed());
        assert_eq!(block.len(), 512);
    }

    #[test]
    fn test_write_and_read_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path, 1024).unwrap();
        let block_id = dm.allocate_block().unwrap();

        let mut block = Block::new(1024);
        block.as_mut_slice()[0] = 0xAB;
        block.as_mut_slice()[1023] = 0xEF;
        dm.write_block(block_id, &block).unwrap();

        let read = dm.read_block(block_id).unwrap();
        assert_eq!(read.as_slice()[0], 0xAB);
        assert_eq!(read.as_slice()[1023], 0xEF);
    }

    #[test]
    fn test_write_wrong_size_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path, 512).unwrap();
        let block_id = dm.allocate_block().unwrap();

        let result = dm.write_block(block_id, &Block::new(256));
        assert!(matches!(result, Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::create(&path, 512).unwrap();
            let block_id = dm.allocate_block().unwrap();

            let mut block = Block::new(512);
            block.as_mut_slice()[0] = 0x42;
            dm.write_block(block_id, &block).unwrap();
        }

        {
            let mut dm = DiskManager::open(&path, 512).unwrap();
            assert_eq!(dm.block_count(), 1);

            let block = dm.read_block(BlockId::new(0)).unwrap();
            assert_eq!(block.as_slice()[0], 0x42);
        }
    }

    #[test]
    fn test_open_with_wrong_block_size_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::create(&path, 512).unwrap();
            dm.allocate_block().unwrap();
        }

        assert!(DiskManager::open(&path, 4096).is_err());
    }

    #[test]
    fn test_extend() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path, 512).unwrap();
        assert_eq!(dm.extend(10).unwrap(), 10);
        assert_eq!(dm.file_size(), 10 * 512);
        assert!(dm.read_block(BlockId::new(9)).unwrap().is_zeroed());
        assert!(dm.read_block(BlockId::new(10)).is_err());
    }

    #[test]
    fn test_read_write_invalid_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path, 512).unwrap();
        assert!(matches!(
            dm.write_block(BlockId::new(0), &Block::new(512)),
            Err(Error::BlockNotFound(0))
        ));

        dm.allocate_block().unwrap();
        assert!(matches!(
            dm.read_block(BlockId::new(1)),
            Err(Error::BlockNotFound(1))
        ));
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::open_or_create(&path, 512).unwrap();
            assert_eq!(dm.block_count(), 0);
            dm.allocate_block().unwrap();
        }

        {
            let dm = DiskManager::open_or_create(&path, 512).unwrap();
            assert_eq!(dm.block_count(), 1);
        }
    }
}
