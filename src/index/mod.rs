//! Index structures.
//!
//! - [`btree`] - Disk-backed B-tree over a [`BlockStore`](crate::storage::BlockStore)

pub mod btree;
