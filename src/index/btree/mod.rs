//! Disk-backed B-tree.
//!
//! A tree occupies a whole [`BlockStore`](crate::storage::BlockStore):
//!
//! ```text
//! block 0        superblock: sizes, root, free-list head, block count
//! block 1        root (moves when the root splits)
//! blocks 2..n    interior nodes, leaves, and Unallocated free-list entries
//! ```
//!
//! Interior nodes hold sorted separators; a key `k` lives under the child
//! left of the first separator `>= k`. Leaves hold sorted key/value pairs.
//! Inserts split full nodes on the way back up, keeping the upper half at
//! the original block so existing parent pointers stay valid. Deletes never
//! merge; an emptied leaf goes back to the free list.
//!
//! # Components
//! - [`BTreeIndex`] - Attach/detach, lookup, insert, update, delete
//! - [`Node`] - Decoded node and its block codec
//! - [`Superblock`] - Tree metadata at block 0
//! - [`DisplayFormat`] / [`SanityReport`] - Diagnostics

mod allocator;
mod config;
mod delete;
mod display;
mod insert;
mod key;
mod lookup;
mod node;
mod sanity;
mod superblock;
mod tree;

pub use config::{BTreeConfig, MIN_INTERIOR_SLOTS, MIN_LEAF_SLOTS};
pub use display::DisplayFormat;
pub use key::{Key, Value};
pub use node::{
    interior_slot_capacity, leaf_slot_capacity, Node, NodeLayout, NODE_HEADER_SIZE, POINTER_SIZE,
};
pub use sanity::SanityReport;
pub use superblock::Superblock;
pub use tree::BTreeIndex;
