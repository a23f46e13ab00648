//! Storage layer - block I/O and block formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level file I/O
//! - [`block`] - Block types and headers
//! - [`BlockStore`] - The storage capability the index is written against
//! - [`MemoryBlockStore`] - In-memory store for tests

pub mod block;
mod block_store;
mod disk_manager;
mod memory;

pub use block_store::BlockStore;
pub use disk_manager::DiskManager;
pub use memory::MemoryBlockStore;
