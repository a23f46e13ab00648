//! Insertion with bottom-up splits.
//!
//! A split keeps the upper half of a node at its original block and moves
//! the lower half to a newly allocated block. Every pointer that already
//! referenced the original block therefore still reaches the right half,
//! and the parent only has to add one separator that points at the new
//! left block.
//!
//! Before anything is written, a read-only pass over the insert path counts
//! the blocks the splits will allocate. An insert that cannot get them all
//! fails with [`Error::NoSpace`] and leaves the tree untouched.

use tracing::{debug, warn};

use crate::common::{BlockId, Error, Result};
use crate::index::btree::key::{Key, Value};
use crate::index::btree::node::Node;
use crate::index::btree::tree::BTreeIndex;
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

/// Result of inserting into a subtree.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum InsertOutcome {
    Done,
    /// The child split: `left` holds every key `<= separator`, the child's
    /// original block holds the rest.
    Split { left: BlockId, separator: Key },
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Insert a new key. Existing keys are rejected with
    /// [`Error::DuplicateKey`]; use [`update`](Self::update) to overwrite.
    ///
    /// [`Error::NoSpace`] is returned before any block is written, so the
    /// insert can be retried after growing the store and calling
    /// [`adopt_new_blocks`](Self::adopt_new_blocks).
    pub fn insert(&mut self, key: &Key, value: &Value) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;
        let root = self.root()?;

        let needed = self.blocks_for_insert(root, key)?;
        if !self.has_free_blocks(needed)? {
            debug!(needed, "not enough free blocks for insert");
            return Err(Error::NoSpace);
        }

        match self.insert_into(root, key, value, 1)? {
            InsertOutcome::Done => Ok(()),
            InsertOutcome::Split { .. } => {
                panic!("root block {} reported a split to its parent", root)
            }
        }
    }

    /// Number of blocks an insert of `key` will allocate. Walks the path the
    /// insert takes without writing, and fails the way the insert would on
    /// a duplicate key.
    fn blocks_for_insert(&self, root: BlockId, key: &Key) -> Result<usize> {
        // For each interior node on the path, root first: whether it splits
        // when its child does.
        let mut full = Vec::new();
        let mut block_id = root;
        let mut depth = 1;
        loop {
            self.check_depth(block_id, depth)?;
            let node = self.read_node(block_id)?;
            match node.node_type {
                NodeType::Root if node.keys.is_empty() => return Ok(2),
                NodeType::Root | NodeType::Interior => {
                    let slot = node.child_slot(key).ok_or(Error::NotFound)?;
                    if node.keys.get(slot) == Some(key) {
                        return Err(Error::DuplicateKey);
                    }
                    full.push(node.keys.len() + 1 >= node.layout.interior_capacity());
                    block_id = node.children[slot];
                }
                NodeType::Leaf => {
                    if node.keys.binary_search(key).is_ok() {
                        return Err(Error::DuplicateKey);
                    }
                    if node.keys.len() + 1 < node.layout.leaf_capacity() {
                        return Ok(0);
                    }
                    let splitting = full.iter().rev().take_while(|&&f| f).count();
                    // A root split also allocates the new root.
                    let promotes = splitting == full.len();
                    return Ok(1 + splitting + usize::from(promotes));
                }
                // Reclaimed as an empty leaf, which one key never splits.
                NodeType::Unallocated => return Ok(0),
                other => panic!(
                    "insert from the root reached block {} of type {:?}",
                    block_id, other
                ),
            }
            depth += 1;
        }
    }

    fn insert_into(
        &mut self,
        block_id: BlockId,
        key: &Key,
        value: &Value,
        depth: u32,
    ) -> Result<InsertOutcome> {
        self.check_depth(block_id, depth)?;
        let node = self.read_node(block_id)?;
        match node.node_type {
            NodeType::Root if node.keys.is_empty() => self.seed_root(block_id, node, key, value),
            NodeType::Root | NodeType::Interior => {
                self.insert_interior(block_id, node, key, value, depth)
            }
            NodeType::Leaf => self.insert_leaf(block_id, node, key, value),
            NodeType::Unallocated => {
                // A leaf emptied by delete; its parent still points here.
                warn!(block = block_id.0, "reclaiming freed leaf for insert");
                self.claim_node(block_id)?;
                let leaf = Node::leaf(node.layout);
                self.insert_leaf(block_id, leaf, key, value)
            }
            other => panic!(
                "insert from the root reached block {} of type {:?}",
                block_id, other
            ),
        }
    }

    /// First insert into an empty tree: the root gets one separator and two
    /// fresh leaves, with the entry in the left one.
    fn seed_root(
        &mut self,
        root_id: BlockId,
        mut root: Node,
        key: &Key,
        value: &Value,
    ) -> Result<InsertOutcome> {
        let layout = root.layout;
        let left = self.allocate_node()?;
        let right = self.allocate_node()?;

        self.write_node(
            left,
            &Node::leaf_with(layout, vec![key.clone()], vec![value.clone()]),
        )?;
        self.write_node(right, &Node::leaf(layout))?;

        root.keys = vec![key.clone()];
        root.children = vec![left, right];
        self.write_node(root_id, &root)?;

        debug!(root = root_id.0, left = left.0, right = right.0, "seeded empty root");
        Ok(InsertOutcome::Done)
    }

    fn insert_leaf(
        &mut self,
        block_id: BlockId,
        mut node: Node,
        key: &Key,
        value: &Value,
    ) -> Result<InsertOutcome> {
        let pos = match node.keys.binary_search(key) {
            Ok(_) => return Err(Error::DuplicateKey),
            Err(pos) => pos,
        };
        node.keys.insert(pos, key.clone());
        node.values.insert(pos, value.clone());

        if node.keys.len() < node.layout.leaf_capacity() {
            self.write_node(block_id, &node)?;
            return Ok(InsertOutcome::Done);
        }

        let left = self.allocate_node()?;
        let mid = node.keys.len() / 2;
        let upper = Node::leaf_with(
            node.layout,
            node.keys.split_off(mid),
            node.values.split_off(mid),
        );
        let separator = node.keys[mid - 1].clone();

        self.write_node(block_id, &upper)?;
        self.write_node(left, &node)?;

        debug!(
            block = block_id.0,
            left = left.0,
            separator = %separator,
            "split leaf"
        );
        Ok(InsertOutcome::Split { left, separator })
    }

    fn insert_interior(
        &mut self,
        block_id: BlockId,
        mut node: Node,
        key: &Key,
        value: &Value,
        depth: u32,
    ) -> Result<InsertOutcome> {
        let slot = match node.child_slot(key) {
            Some(i) if node.keys.get(i) == Some(key) => return Err(Error::DuplicateKey),
            Some(i) => i,
            None => return Err(Error::NotFound),
        };

        match self.insert_into(node.children[slot], key, value, depth + 1)? {
            InsertOutcome::Done => Ok(InsertOutcome::Done),
            InsertOutcome::Split { left, separator } => {
                node.keys.insert(slot, separator);
                node.children.insert(slot, left);
                self.store_or_split_interior(block_id, node)
            }
        }
    }

    /// Write an interior node that just gained a separator, splitting it
    /// first if it has reached capacity.
    fn store_or_split_interior(&mut self, block_id: BlockId, mut node: Node) -> Result<InsertOutcome> {
        if node.keys.len() < node.layout.interior_capacity() {
            self.write_node(block_id, &node)?;
            return Ok(InsertOutcome::Done);
        }

        let left = self.allocate_node()?;
        let mid = node.keys.len() / 2;
        let upper = Node::interior(
            NodeType::Interior,
            node.layout,
            node.keys.split_off(mid + 1),
            node.children.split_off(mid + 1),
        );
        // The boundary key moves up; neither half keeps it.
        let separator = node
            .keys
            .pop()
            .expect("interior node at capacity has keys");
        let is_root = node.node_type == NodeType::Root;
        node.node_type = NodeType::Interior;

        self.write_node(block_id, &upper)?;
        self.write_node(left, &node)?;
        debug!(
            block = block_id.0,
            left = left.0,
            separator = %separator,
            "split interior node"
        );

        if !is_root {
            return Ok(InsertOutcome::Split { left, separator });
        }

        let new_root = self.allocate_node()?;
        let root = Node::interior(
            NodeType::Root,
            node.layout,
            vec![separator],
            vec![left, block_id],
        );
        self.write_node(new_root, &root)?;
        self.superblock_mut()?.root = new_root;
        self.persist_superblock()?;
        debug!(old = block_id.0, new = new_root.0, "promoted new root");
        Ok(InsertOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use crate::common::{BlockId, Error};
    use crate::index::btree::{BTreeConfig, BTreeIndex, Key, Value};
    use crate::storage::block::NodeType;
    use crate::storage::MemoryBlockStore;

    fn fresh(block_size: usize, blocks: u32) -> BTreeIndex<MemoryBlockStore> {
        let mut tree = BTreeIndex::new(
            MemoryBlockStore::new(block_size, blocks),
            BTreeConfig::new(8, 8),
        );
        tree.attach(BlockId::SUPERBLOCK, true).unwrap();
        tree
    }

    fn put(tree: &mut BTreeIndex<MemoryBlockStore>, k: u64) {
        tree.insert(&Key::from_u64(k), &Value::from_u64(k)).unwrap();
    }

    #[test]
    fn test_first_insert_seeds_two_leaves() {
        let mut tree = fresh(512, 16);
        put(&mut tree, 42);

        let root = tree.read_node(BlockId(1)).unwrap();
        assert_eq!(root.keys, vec![Key::from_u64(42)]);
        assert_eq!(root.children, vec![BlockId(2), BlockId(3)]);

        let left = tree.read_node(BlockId(2)).unwrap();
        let right = tree.read_node(BlockId(3)).unwrap();
        assert_eq!(left.node_type, NodeType::Leaf);
        assert_eq!(left.keys, vec![Key::from_u64(42)]);
        assert_eq!(right.node_type, NodeType::Leaf);
        assert!(right.keys.is_empty());
    }

    #[test]
    fn test_duplicate_key_leaves_tree_unchanged() {
        let mut tree = fresh(512, 16);
        put(&mut tree, 1);
        put(&mut tree, 2);
        let before = tree.display(crate::index::btree::DisplayFormat::Depth).unwrap();

        assert!(matches!(
            tree.insert(&Key::from_u64(2), &Value::from_u64(9)),
            Err(Error::DuplicateKey)
        ));
        // Separator hit in an interior node.
        assert!(matches!(
            tree.insert(&Key::from_u64(1), &Value::from_u64(9)),
            Err(Error::DuplicateKey)
        ));
        assert_eq!(
            tree.display(crate::index::btree::DisplayFormat::Depth).unwrap(),
            before
        );
    }

    #[test]
    fn test_leaf_split_keeps_upper_half_in_place() {
        // 72 byte blocks: leaf capacity (72 - 29) / 16 = 2.
        let mut tree = fresh(72, 32);
        put(&mut tree, 10);
        // Root [10] -> left 2 {10}, right 3 {}.
        put(&mut tree, 5);
        // Left leaf reached capacity and split: {10} stays at block 2,
        // {5} moves to the newly allocated block 4.
        let root = tree.read_node(BlockId(1)).unwrap();
        assert_eq!(root.keys, vec![Key::from_u64(5), Key::from_u64(10)]);
        assert_eq!(root.children, vec![BlockId(4), BlockId(2), BlockId(3)]);
        assert_eq!(tree.read_node(BlockId(4)).unwrap().keys, vec![Key::from_u64(5)]);
        assert_eq!(tree.read_node(BlockId(2)).unwrap().keys, vec![Key::from_u64(10)]);
    }

    #[test]
    fn test_root_promotion() {
        // 72 byte blocks: interior capacity (72 - 33) / 12 = 3, leaf capacity 2.
        let mut tree = fresh(72, 64);
        for k in 1..=12 {
            put(&mut tree, k);
        }
        let root_id = tree.root().unwrap();
        assert_ne!(root_id, BlockId(1));

        let root = tree.read_node(root_id).unwrap();
        assert_eq!(root.node_type, NodeType::Root);
        assert_eq!(root.keys.len(), 1);
        assert_eq!(
            tree.read_node(BlockId(1)).unwrap().node_type,
            NodeType::Interior
        );
        for k in 1..=12 {
            assert_eq!(tree.lookup(&Key::from_u64(k)).unwrap(), Value::from_u64(k));
        }
        tree.sanity_check().unwrap();
    }

    #[test]
    fn test_no_space() {
        let mut tree = fresh(512, 3);
        assert!(matches!(
            tree.insert(&Key::from_u64(1), &Value::from_u64(1)),
            Err(Error::NoSpace)
        ));
    }

    #[test]
    fn test_grow_and_retry_after_no_space() {
        use crate::storage::BlockStore;

        let mut tree = fresh(512, 3);
        assert!(matches!(
            tree.insert(&Key::from_u64(1), &Value::from_u64(1)),
            Err(Error::NoSpace)
        ));
        // Seeding needs two leaves and only block 2 is free; nothing was taken.
        assert_eq!(tree.free_list_head().unwrap(), Some(BlockId(2)));
        tree.store().grow(4).unwrap();
        tree.adopt_new_blocks().unwrap();
        put(&mut tree, 1);
        assert_eq!(tree.lookup(&Key::from_u64(1)).unwrap(), Value::from_u64(1));
    }

    #[test]
    fn test_no_space_keeps_every_stored_key() {
        use crate::storage::BlockStore;

        // Every store size runs out at a different point: during a leaf
        // split, an interior split or a root promotion.
        for blocks in 6..60u32 {
            let mut tree = fresh(72, blocks);
            let mut next = 1;
            loop {
                match tree.insert(&Key::from_u64(next), &Value::from_u64(next)) {
                    Ok(()) => next += 1,
                    Err(Error::NoSpace) => break,
                    Err(e) => panic!("{} blocks: unexpected {:?}", blocks, e),
                }
            }

            let root = tree.read_node(tree.root().unwrap()).unwrap();
            assert_eq!(root.node_type, NodeType::Root, "{} blocks", blocks);
            let report = tree.sanity_check().unwrap();
            assert!(report.orphaned.is_empty(), "{} blocks: {}", blocks, report);
            assert_eq!(report.keys as u64, next - 1, "{} blocks", blocks);

            tree.store().grow(64).unwrap();
            tree.adopt_new_blocks().unwrap();
            put(&mut tree, next);
            for k in 1..=next {
                assert_eq!(
                    tree.lookup(&Key::from_u64(k)).unwrap(),
                    Value::from_u64(k),
                    "{} blocks: key {}",
                    blocks,
                    k
                );
            }
            tree.sanity_check().unwrap();
        }
    }

    #[test]
    fn test_duplicate_rejected_before_space_check() {
        let mut tree = fresh(512, 4);
        put(&mut tree, 1);
        assert_eq!(tree.free_list_head().unwrap(), None);
        assert!(matches!(
            tree.insert(&Key::from_u64(1), &Value::from_u64(1)),
            Err(Error::DuplicateKey)
        ));
    }

    #[test]
    fn test_write_failure_mid_insert_propagates() {
        let mut tree = fresh(512, 16);
        put(&mut tree, 1);
        tree.store().fail_writes_after(0);
        assert!(matches!(
            tree.insert(&Key::from_u64(2), &Value::from_u64(2)),
            Err(Error::Io(_))
        ));
        tree.store().heal();
        assert!(matches!(tree.lookup(&Key::from_u64(2)), Err(Error::NotFound)));
    }
}
