//! Tree metadata stored at block 0.
//!
//! The superblock uses the shared node header (see [`super::node`]) with
//! the root and free-list fields populated and a 4-byte body holding the
//! number of blocks the tree has formatted.

use crate::common::{BlockId, Error, Result};
use crate::index::btree::node::{
    get_u32, put_u32, write_common_header, NodeLayout, NODE_HEADER_SIZE, OFFSET_BLOCK_SIZE,
    OFFSET_KEY_SIZE, OFFSET_NEXT_FREE, OFFSET_ROOT, OFFSET_VALUE_SIZE,
};
use crate::storage::block::{Block, BlockHeader, NodeType};

const OFFSET_BLOCK_COUNT: usize = NODE_HEADER_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub layout: NodeLayout,
    pub root: BlockId,
    pub free_list_head: Option<BlockId>,
    /// Blocks `0..block_count` are either reachable or on the free list.
    pub block_count: u32,
}

impl Superblock {
    pub fn encode(&self) -> Block {
        let mut block = Block::new(self.layout.block_size);
        let data = block.as_mut_slice();
        write_common_header(
            data,
            NodeType::Superblock,
            self.layout,
            Some(self.root),
            self.free_list_head,
            0,
        );
        put_u32(data, OFFSET_BLOCK_COUNT, self.block_count);
        block.update_checksum();
        block
    }

    /// Decode block 0. The layout is read from the block itself.
    pub fn decode(block: &Block) -> Result<Self> {
        let id = BlockId::SUPERBLOCK.0;
        if block.len() < NODE_HEADER_SIZE + 4 {
            return Err(Error::corrupted(id, "block too small for a superblock"));
        }
        if block.is_zeroed() {
            return Err(Error::corrupted(id, "superblock was never formatted"));
        }

        let header = block.header();
        let data = block.as_slice();
        let computed = BlockHeader::compute_checksum(data);
        if header.checksum != computed {
            return Err(Error::ChecksumMismatch {
                block: id,
                stored: header.checksum,
                computed,
            });
        }
        if header.node_type() != Some(NodeType::Superblock) {
            return Err(Error::corrupted(
                id,
                format!("expected superblock, found tag {}", header.tag),
            ));
        }

        let layout = NodeLayout::new(
            get_u32(data, OFFSET_KEY_SIZE) as usize,
            get_u32(data, OFFSET_VALUE_SIZE) as usize,
            get_u32(data, OFFSET_BLOCK_SIZE) as usize,
        );
        if layout.block_size != block.len() {
            return Err(Error::SizeMismatch {
                what: "block",
                expected: layout.block_size,
                actual: block.len(),
            });
        }

        let root = BlockId::from_link(get_u32(data, OFFSET_ROOT))
            .ok_or_else(|| Error::corrupted(id, "root points at the superblock"))?;
        let block_count = get_u32(data, OFFSET_BLOCK_COUNT);
        if root.0 >= block_count {
            return Err(Error::corrupted(
                id,
                format!("root {} outside {} formatted blocks", root, block_count),
            ));
        }

        Ok(Self {
            layout,
            root,
            free_list_head: BlockId::from_link(get_u32(data, OFFSET_NEXT_FREE)),
            block_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Superblock {
        Superblock {
            layout: NodeLayout::new(8, 8, 512),
            root: BlockId(1),
            free_list_head: Some(BlockId(2)),
            block_count: 100,
        }
    }

    #[test]
    fn test_roundtrip() {
        let sb = sample();
        assert_eq!(Superblock::decode(&sb.encode()).unwrap(), sb);
    }

    #[test]
    fn test_empty_free_list() {
        let sb = Superblock {
            free_list_head: None,
            ..sample()
        };
        let decoded = Superblock::decode(&sb.encode()).unwrap();
        assert_eq!(decoded.free_list_head, None);
    }

    #[test]
    fn test_rejects_other_node_types() {
        let mut block = sample().encode();
        block.as_mut_slice()[0] = NodeType::Leaf as u8;
        block.update_checksum();
        assert!(matches!(
            Superblock::decode(&block),
            Err(Error::Corrupted { block: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_unformatted() {
        assert!(Superblock::decode(&Block::new(512)).is_err());
    }

    #[test]
    fn test_detects_torn_write() {
        let mut block = sample().encode();
        block.as_mut_slice()[OFFSET_ROOT] = 7;
        assert!(matches!(
            Superblock::decode(&block),
            Err(Error::ChecksumMismatch { .. })
        ));
    }
}
