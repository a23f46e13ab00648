//! In-memory node and its on-disk codec.
//!
//! Every tree block shares one fixed header:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     node type tag
//! 1       4     CRC32 checksum (little-endian)
//! 5       4     key_size
//! 9       4     value_size
//! 13      4     block_size
//! 17      4     root block (superblock only, 0 elsewhere)
//! 21      4     free-list link (0 = none)
//! 25      4     number of keys
//! 29      ...   body
//! ```
//!
//! Root and interior bodies hold `ptr0 key0 ptr1 key1 ... key(n-1) ptr(n)`,
//! leaf bodies hold `n` key/value pairs. All integers are little-endian.

use crate::common::{BlockId, Error, Result};
use crate::index::btree::key::{Key, Value};
use crate::storage::block::{Block, BlockHeader, NodeType};

/// Size of the shared node header in bytes.
pub const NODE_HEADER_SIZE: usize = 29;

/// Width of a child pointer in an interior body.
pub const POINTER_SIZE: usize = 4;

pub(crate) const OFFSET_KEY_SIZE: usize = 5;
pub(crate) const OFFSET_VALUE_SIZE: usize = 9;
pub(crate) const OFFSET_BLOCK_SIZE: usize = 13;
pub(crate) const OFFSET_ROOT: usize = 17;
pub(crate) const OFFSET_NEXT_FREE: usize = 21;
pub(crate) const OFFSET_NUM_KEYS: usize = 25;

/// Number of keys an interior or root node can hold in one block.
pub fn interior_slot_capacity(block_size: usize, key_size: usize) -> usize {
    block_size.saturating_sub(NODE_HEADER_SIZE + POINTER_SIZE) / (key_size + POINTER_SIZE)
}

/// Number of key/value pairs a leaf can hold in one block.
pub fn leaf_slot_capacity(block_size: usize, key_size: usize, value_size: usize) -> usize {
    block_size.saturating_sub(NODE_HEADER_SIZE) / (key_size + value_size)
}

/// Key width, value width and block size shared by every node of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    pub key_size: usize,
    pub value_size: usize,
    pub block_size: usize,
}

impl NodeLayout {
    pub fn new(key_size: usize, value_size: usize, block_size: usize) -> Self {
        Self {
            key_size,
            value_size,
            block_size,
        }
    }

    #[inline]
    pub fn interior_capacity(&self) -> usize {
        interior_slot_capacity(self.block_size, self.key_size)
    }

    #[inline]
    pub fn leaf_capacity(&self) -> usize {
        leaf_slot_capacity(self.block_size, self.key_size, self.value_size)
    }

    /// Capacity for a node of the given type (0 for non-tree nodes).
    pub fn capacity(&self, node_type: NodeType) -> usize {
        match node_type {
            NodeType::Root | NodeType::Interior => self.interior_capacity(),
            NodeType::Leaf => self.leaf_capacity(),
            _ => 0,
        }
    }
}

/// Decoded form of a tree block.
///
/// Root and interior nodes use `keys` and `children` (`children.len()` is
/// `keys.len() + 1`, or 0 for a root that has never been seeded). Leaves use
/// `keys` and `values`. Free blocks only carry `next_free`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub node_type: NodeType,
    pub layout: NodeLayout,
    pub keys: Vec<Key>,
    pub children: Vec<BlockId>,
    pub values: Vec<Value>,
    pub next_free: Option<BlockId>,
}

impl Node {
    fn empty(node_type: NodeType, layout: NodeLayout) -> Self {
        Self {
            node_type,
            layout,
            keys: Vec::new(),
            children: Vec::new(),
            values: Vec::new(),
            next_free: None,
        }
    }

    /// An empty leaf.
    pub fn leaf(layout: NodeLayout) -> Self {
        Self::empty(NodeType::Leaf, layout)
    }

    /// A leaf holding parallel `keys` and `values`.
    pub fn leaf_with(layout: NodeLayout, keys: Vec<Key>, values: Vec<Value>) -> Self {
        Self {
            keys,
            values,
            ..Self::leaf(layout)
        }
    }

    /// A root with no keys and no children.
    pub fn empty_root(layout: NodeLayout) -> Self {
        Self::empty(NodeType::Root, layout)
    }

    /// A root or interior node.
    pub fn interior(
        node_type: NodeType,
        layout: NodeLayout,
        keys: Vec<Key>,
        children: Vec<BlockId>,
    ) -> Self {
        debug_assert!(node_type.is_interior());
        Self {
            keys,
            children,
            ..Self::empty(node_type, layout)
        }
    }

    /// A free-list entry linking to `next_free`.
    pub fn unallocated(layout: NodeLayout, next_free: Option<BlockId>) -> Self {
        Self {
            next_free,
            ..Self::empty(NodeType::Unallocated, layout)
        }
    }

    #[inline]
    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    /// Descent slot for lookup and insert: the first key `>= key`, or the
    /// last child when every key is smaller. `None` for a node without keys.
    pub fn child_slot(&self, key: &Key) -> Option<usize> {
        if self.keys.is_empty() {
            return None;
        }
        Some(
            self.keys
                .iter()
                .position(|k| key <= k)
                .unwrap_or(self.keys.len()),
        )
    }

    /// Encode into a fresh block with a valid checksum.
    pub fn encode(&self, block_id: BlockId) -> Result<Block> {
        let layout = self.layout;
        let mut block = Block::new(layout.block_size);
        let n = self.keys.len();

        match self.node_type {
            NodeType::Root | NodeType::Interior => {
                if n > layout.interior_capacity() {
                    return Err(Error::corrupted(
                        block_id.0,
                        format!("{} keys exceed interior capacity", n),
                    ));
                }
                let consistent = self.children.len() == n + 1
                    || (self.children.is_empty() && n == 0);
                if !consistent {
                    return Err(Error::corrupted(
                        block_id.0,
                        format!("{} keys with {} children", n, self.children.len()),
                    ));
                }
            }
            NodeType::Leaf => {
                if n > layout.leaf_capacity() {
                    return Err(Error::corrupted(
                        block_id.0,
                        format!("{} keys exceed leaf capacity", n),
                    ));
                }
                if self.values.len() != n {
                    return Err(Error::corrupted(
                        block_id.0,
                        format!("{} keys with {} values", n, self.values.len()),
                    ));
                }
            }
            NodeType::Unallocated => {}
            other => {
                return Err(Error::corrupted(
                    block_id.0,
                    format!("cannot encode a {:?} block as a node", other),
                ))
            }
        }

        let data = block.as_mut_slice();
        write_common_header(data, self.node_type, layout, None, self.next_free, n as u32);

        let mut offset = NODE_HEADER_SIZE;
        match self.node_type {
            NodeType::Root | NodeType::Interior => {
                for (i, child) in self.children.iter().enumerate() {
                    put_u32(data, offset, child.0);
                    offset += POINTER_SIZE;
                    if let Some(key) = self.keys.get(i) {
                        put_bytes(data, offset, "key", key.as_bytes(), layout.key_size)?;
                        offset += layout.key_size;
                    }
                }
            }
            NodeType::Leaf => {
                for (key, value) in self.keys.iter().zip(&self.values) {
                    put_bytes(data, offset, "key", key.as_bytes(), layout.key_size)?;
                    offset += layout.key_size;
                    put_bytes(data, offset, "value", value.as_bytes(), layout.value_size)?;
                    offset += layout.value_size;
                }
            }
            _ => {}
        }

        block.update_checksum();
        Ok(block)
    }

    /// Decode a block, checking it against the tree's `layout`.
    ///
    /// An all-zero block decodes as an empty [`NodeType::Invalid`] node; a
    /// superblock decodes as an empty [`NodeType::Superblock`] node. Callers
    /// decide whether reaching either is an error.
    pub fn decode(block_id: BlockId, block: &Block, layout: NodeLayout) -> Result<Node> {
        if block.len() != layout.block_size {
            return Err(Error::SizeMismatch {
                what: "block",
                expected: layout.block_size,
                actual: block.len(),
            });
        }
        if block.is_zeroed() {
            return Ok(Node::empty(NodeType::Invalid, layout));
        }

        let header = block.header();
        let data = block.as_slice();
        let computed = BlockHeader::compute_checksum(data);
        if header.checksum != computed {
            return Err(Error::ChecksumMismatch {
                block: block_id.0,
                stored: header.checksum,
                computed,
            });
        }

        let node_type = header
            .node_type()
            .ok_or_else(|| Error::corrupted(block_id.0, format!("unknown tag {}", header.tag)))?;

        let stored = NodeLayout::new(
            get_u32(data, OFFSET_KEY_SIZE) as usize,
            get_u32(data, OFFSET_VALUE_SIZE) as usize,
            get_u32(data, OFFSET_BLOCK_SIZE) as usize,
        );
        if stored != layout {
            return Err(Error::corrupted(
                block_id.0,
                format!("layout {:?} does not match tree layout {:?}", stored, layout),
            ));
        }

        let n = get_u32(data, OFFSET_NUM_KEYS) as usize;
        let capacity = layout.capacity(node_type);
        if (node_type.is_interior() || node_type == NodeType::Leaf) && n > capacity {
            return Err(Error::corrupted(
                block_id.0,
                format!("{} keys exceed capacity {}", n, capacity),
            ));
        }

        let mut node = Node::empty(node_type, layout);
        node.next_free = BlockId::from_link(get_u32(data, OFFSET_NEXT_FREE));

        let mut offset = NODE_HEADER_SIZE;
        match node_type {
            NodeType::Root | NodeType::Interior if n > 0 => {
                for i in 0..=n {
                    let child = get_u32(data, offset);
                    if child == 0 {
                        return Err(Error::corrupted(
                            block_id.0,
                            format!("child {} points at the superblock", i),
                        ));
                    }
                    node.children.push(BlockId(child));
                    offset += POINTER_SIZE;
                    if i < n {
                        node.keys.push(Key::from(&data[offset..offset + layout.key_size]));
                        offset += layout.key_size;
                    }
                }
            }
            NodeType::Leaf => {
                for _ in 0..n {
                    node.keys.push(Key::from(&data[offset..offset + layout.key_size]));
                    offset += layout.key_size;
                    node.values.push(Value::from(&data[offset..offset + layout.value_size]));
                    offset += layout.value_size;
                }
            }
            _ => {}
        }

        Ok(node)
    }
}

/// Write everything in the shared header except the checksum.
pub(crate) fn write_common_header(
    data: &mut [u8],
    node_type: NodeType,
    layout: NodeLayout,
    root: Option<BlockId>,
    next_free: Option<BlockId>,
    num_keys: u32,
) {
    BlockHeader::new(node_type).write_to(data);
    put_u32(data, OFFSET_KEY_SIZE, layout.key_size as u32);
    put_u32(data, OFFSET_VALUE_SIZE, layout.value_size as u32);
    put_u32(data, OFFSET_BLOCK_SIZE, layout.block_size as u32);
    put_u32(data, OFFSET_ROOT, BlockId::to_link(root));
    put_u32(data, OFFSET_NEXT_FREE, BlockId::to_link(next_free));
    put_u32(data, OFFSET_NUM_KEYS, num_keys);
}

#[inline]
pub(crate) fn get_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_bytes(
    data: &mut [u8],
    offset: usize,
    what: &'static str,
    bytes: &[u8],
    width: usize,
) -> Result<()> {
    if bytes.len() != width {
        return Err(Error::SizeMismatch {
            what,
            expected: width,
            actual: bytes.len(),
        });
    }
    data[offset..offset + width].copy_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> NodeLayout {
        NodeLayout::new(8, 8, 512)
    }

    fn keys(ns: &[u64]) -> Vec<Key> {
        ns.iter().map(|&n| Key::from_u64(n)).collect()
    }

    #[test]
    fn test_capacities() {
        assert_eq!(leaf_slot_capacity(512, 8, 8), 30);
        assert_eq!(interior_slot_capacity(512, 8), 39);
        assert_eq!(leaf_slot_capacity(16, 8, 8), 0);
        assert_eq!(layout().capacity(NodeType::Root), 39);
        assert_eq!(layout().capacity(NodeType::Unallocated), 0);
    }

    #[test]
    fn test_interior_byte_layout() {
        let node = Node::interior(
            NodeType::Interior,
            layout(),
            keys(&[7]),
            vec![BlockId(3), BlockId(9)],
        );
        let block = node.encode(BlockId(5)).unwrap();
        let data = block.as_slice();

        assert_eq!(data[0], NodeType::Interior as u8);
        assert_eq!(get_u32(data, OFFSET_KEY_SIZE), 8);
        assert_eq!(get_u32(data, OFFSET_BLOCK_SIZE), 512);
        assert_eq!(get_u32(data, OFFSET_NUM_KEYS), 1);
        assert_eq!(get_u32(data, NODE_HEADER_SIZE), 3);
        assert_eq!(&data[33..41], &7u64.to_be_bytes());
        assert_eq!(get_u32(data, 41), 9);
        assert!(block.verify_checksum());
    }

    #[test]
    fn test_full_leaf_roundtrip() {
        let l = layout();
        let ks = keys(&(0..30).collect::<Vec<_>>());
        let vs = (0..30).map(|n| Value::from_u64(n * 10)).collect();
        let node = Node::leaf_with(l, ks, vs);

        let block = node.encode(BlockId(1)).unwrap();
        assert_eq!(Node::decode(BlockId(1), &block, l).unwrap(), node);
    }

    #[test]
    fn test_unallocated_keeps_link() {
        let l = layout();
        let node = Node::unallocated(l, Some(BlockId(12)));
        let block = node.encode(BlockId(4)).unwrap();
        let decoded = Node::decode(BlockId(4), &block, l).unwrap();
        assert_eq!(decoded.node_type, NodeType::Unallocated);
        assert_eq!(decoded.next_free, Some(BlockId(12)));
    }

    #[test]
    fn test_empty_root_has_no_children() {
        let l = layout();
        let block = Node::empty_root(l).encode(BlockId(1)).unwrap();
        let decoded = Node::decode(BlockId(1), &block, l).unwrap();
        assert_eq!(decoded.node_type, NodeType::Root);
        assert!(decoded.keys.is_empty());
        assert!(decoded.children.is_empty());
    }

    #[test]
    fn test_zeroed_block_is_invalid() {
        let block = Block::new(512);
        let node = Node::decode(BlockId(2), &block, layout()).unwrap();
        assert_eq!(node.node_type, NodeType::Invalid);
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut block = Node::leaf(layout()).encode(BlockId(2)).unwrap();
        block.as_mut_slice()[200] ^= 0xFF;
        assert!(matches!(
            Node::decode(BlockId(2), &block, layout()),
            Err(Error::ChecksumMismatch { block: 2, .. })
        ));
    }

    #[test]
    fn test_layout_mismatch_is_corruption() {
        let block = Node::leaf(layout()).encode(BlockId(2)).unwrap();
        let other = NodeLayout::new(4, 8, 512);
        assert!(matches!(
            Node::decode(BlockId(2), &block, other),
            Err(Error::Corrupted { block: 2, .. })
        ));
    }

    #[test]
    fn test_overfull_leaf_rejected() {
        let l = NodeLayout::new(8, 8, 64);
        // (64 - 29) / 16 = 2 slots
        let node = Node::leaf_with(
            l,
            keys(&[1, 2, 3]),
            (1..=3).map(Value::from_u64).collect(),
        );
        assert!(node.encode(BlockId(1)).is_err());
    }

    #[test]
    fn test_wrong_key_width_rejected() {
        let node = Node::leaf_with(
            layout(),
            vec![Key::new(vec![1, 2, 3])],
            vec![Value::from_u64(1)],
        );
        assert!(matches!(
            node.encode(BlockId(1)),
            Err(Error::SizeMismatch { what: "key", expected: 8, actual: 3 })
        ));
    }

    #[test]
    fn test_child_slot() {
        let node = Node::interior(
            NodeType::Root,
            layout(),
            keys(&[10, 20]),
            vec![BlockId(1), BlockId(2), BlockId(3)],
        );
        assert_eq!(node.child_slot(&Key::from_u64(5)), Some(0));
        assert_eq!(node.child_slot(&Key::from_u64(10)), Some(0));
        assert_eq!(node.child_slot(&Key::from_u64(15)), Some(1));
        assert_eq!(node.child_slot(&Key::from_u64(25)), Some(2));
        assert_eq!(Node::empty_root(layout()).child_slot(&Key::from_u64(1)), None);
    }
}
