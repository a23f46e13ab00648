//! Integration tests for the block cache.
//!
//! These tests verify cross-component behavior that unit tests don't cover.

use blocktree::buffer::BlockCache;
use blocktree::common::BlockId;
use blocktree::storage::{BlockStore, DiskManager};
use blocktree::Block;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const BLOCK_SIZE: usize = 512;

fn create_cache(pool_size: usize) -> (BlockCache, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let dm = DiskManager::create(&path, BLOCK_SIZE).unwrap();
    (BlockCache::new(pool_size, dm), dir)
}

/// Blocks written through a tiny cache survive repeated eviction.
#[test]
fn test_data_persistence_across_evictions() {
    let (cache, _dir) = create_cache(2);

    let mut block_ids = vec![];
    for i in 0u8..5 {
        let mut guard = cache.new_block().unwrap();
        guard.as_mut_slice()[0] = i;
        guard.as_mut_slice()[BLOCK_SIZE - 1] = i.wrapping_mul(3);
        block_ids.push(guard.block_id());
    }

    for (i, &bid) in block_ids.iter().enumerate() {
        let guard = cache.fetch_block_read(bid).unwrap();
        assert_eq!(guard.as_slice()[0], i as u8);
        assert_eq!(guard.as_slice()[BLOCK_SIZE - 1], (i as u8).wrapping_mul(3));
    }
}

/// `flush` through the store trait reaches the file.
#[test]
fn test_flush_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let data = b"persistent!";

    {
        let mut dm = DiskManager::create(&path, BLOCK_SIZE).unwrap();
        dm.extend(4).unwrap();
        let cache = BlockCache::new(8, dm);

        let mut block = Block::new(BLOCK_SIZE);
        block.as_mut_slice()[..data.len()].copy_from_slice(data);
        cache.write_block(BlockId::new(3), &block).unwrap();
        cache.flush().unwrap();
    }

    {
        let dm = DiskManager::open(&path, BLOCK_SIZE).unwrap();
        assert_eq!(dm.block_count(), 4);
        let cache = BlockCache::new(8, dm);

        let block = cache.read_block(BlockId::new(3)).unwrap();
        assert_eq!(&block.as_slice()[..data.len()], data);
    }
}

/// Concurrent writers to different blocks each see their last write.
#[test]
fn test_concurrent_writers() {
    let (cache, _dir) = create_cache(10);
    let cache = Arc::new(cache);

    let block_ids: Vec<BlockId> = (0..5)
        .map(|_| cache.new_block().unwrap().block_id())
        .collect();

    let mut handles = vec![];

    for (i, bid) in block_ids.iter().enumerate() {
        let cache = Arc::clone(&cache);
        let bid = *bid;

        handles.push(thread::spawn(move || {
            for j in 0..50 {
                let mut guard = cache.fetch_block_write(bid).unwrap();
                guard.as_mut_slice()[0] = ((i * 50 + j) % 256) as u8;
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    for (i, &bid) in block_ids.iter().enumerate() {
        let guard = cache.fetch_block_read(bid).unwrap();
        assert_eq!(guard.as_slice()[0], ((i * 50 + 49) % 256) as u8);
    }
}

/// Hit, miss and eviction counters move as expected.
#[test]
fn test_stats_accuracy() {
    let (cache, _dir) = create_cache(2);

    let bid = cache.new_block().unwrap().block_id();

    for _ in 0..5 {
        let _ = cache.fetch_block_read(bid).unwrap();
    }

    let stats = cache.stats().snapshot();
    assert!(stats.cache_hits >= 5);

    let _ = cache.new_block().unwrap();
    let _ = cache.new_block().unwrap();

    let stats = cache.stats().snapshot();
    assert!(stats.evictions >= 1);
}

/// The store trait can be shared through an `Arc`.
#[test]
fn test_arc_store_grows_file() {
    let (cache, _dir) = create_cache(4);
    let store: Arc<BlockCache> = Arc::new(cache);

    assert_eq!(store.block_count(), 0);
    assert_eq!(store.grow(6).unwrap(), 6);
    assert_eq!(store.block_size(), BLOCK_SIZE);
    assert!(store.read_block(BlockId::new(5)).unwrap().is_zeroed());
    assert!(store.read_block(BlockId::new(6)).is_err());
}
