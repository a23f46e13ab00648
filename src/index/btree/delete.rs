//! Key removal.
//!
//! Deletion never merges or rebalances. A leaf that loses its last entry is
//! returned to the free list while its parent keeps pointing at it; later
//! descents treat the freed block as an empty leaf (see
//! [`BTreeIndex::insert`]).

use crate::common::{BlockId, Error, Result};
use crate::index::btree::key::Key;
use crate::index::btree::tree::BTreeIndex;
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

impl<S: BlockStore> BTreeIndex<S> {
    /// Remove `key` and its value.
    ///
    /// Interior nodes route a delete to the first child whose separator is
    /// strictly greater than `key`, falling through to the last child. A key
    /// equal to a separator is therefore looked for in the right subtree
    /// and reported as [`Error::NotFound`] even though [`lookup`](Self::lookup)
    /// finds it on the left. Falling through differs from a plain "no
    /// separator matched, not found" rule, which would leave every key in
    /// the rightmost leaf undeletable.
    ///
    /// Deleting the only key of a leaf frees the leaf while its parent keeps
    /// the pointer. Until an insert routed to that pointer reclaims the
    /// block, the allocator may hand it to a split elsewhere. The parent
    /// then reaches the new node through a stale pointer: keys stored in
    /// that node can become unreachable through their proper separator, and
    /// [`sanity_check`](Self::sanity_check) reports the tree as corrupted.
    pub fn delete(&mut self, key: &Key) -> Result<()> {
        self.check_key(key)?;
        let root = self.root()?;
        self.delete_from(root, key, 1)
    }

    fn delete_from(&mut self, block_id: BlockId, key: &Key, depth: u32) -> Result<()> {
        self.check_depth(block_id, depth)?;
        let mut node = self.read_node(block_id)?;
        match node.node_type {
            NodeType::Root | NodeType::Interior => {
                if node.keys.is_empty() {
                    return Err(Error::NotFound);
                }
                let slot = node
                    .keys
                    .iter()
                    .position(|k| key < k)
                    .unwrap_or(node.keys.len());
                self.delete_from(node.children[slot], key, depth + 1)
            }
            NodeType::Leaf => {
                let pos = node
                    .keys
                    .iter()
                    .position(|k| k == key)
                    .ok_or(Error::NotFound)?;
                if node.keys.len() == 1 {
                    return self.deallocate_node(block_id);
                }
                node.keys.remove(pos);
                node.values.remove(pos);
                self.write_node(block_id, &node)
            }
            NodeType::Unallocated => Err(Error::NotFound),
            other => panic!(
                "delete from the root reached block {} of type {:?}",
                block_id, other
            ),
        }
    }
}
