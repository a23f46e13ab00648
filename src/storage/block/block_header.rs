//! Block header and node type definitions.
//!
//! Every block starts with a [`BlockHeader`] containing:
//! - [`NodeType`] discriminator
//! - CRC32 checksum for integrity

/// Type of node stored in a block.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Never formatted (all-zero) block.
    #[default]
    Invalid = 0,
    /// Tree-wide metadata at block 0.
    Superblock = 1,
    /// The single root of the tree; laid out like an interior node.
    Root = 2,
    /// B-tree interior (non-leaf, non-root) node.
    Interior = 3,
    /// B-tree leaf node.
    Leaf = 4,
    /// Block on the free list.
    Unallocated = 5,
}

impl NodeType {
    /// Convert from u8, returning `None` for unknown tags.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(NodeType::Invalid),
            1 => Some(NodeType::Superblock),
            2 => Some(NodeType::Root),
            3 => Some(NodeType::Interior),
            4 => Some(NodeType::Leaf),
            5 => Some(NodeType::Unallocated),
            _ => None,
        }
    }

    /// Root and interior nodes share the key/pointer layout.
    #[inline]
    pub fn is_interior(self) -> bool {
        matches!(self, NodeType::Root | NodeType::Interior)
    }
}

/// Metadata stored at the beginning of every block.
///
/// # Layout (5 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     node_type (NodeType as u8)
/// 1       4     checksum (CRC32, little-endian)
/// ```
///
/// # Checksum
/// The checksum is computed over the entire block with the checksum field
/// itself set to zero. This allows verification without special handling.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Raw type tag of this block (see [`NodeType::from_u8`]).
    pub tag: u8,
    /// CRC32 checksum of the block contents.
    pub checksum: u32,
}

impl BlockHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 5;

    /// Offset of each field within the header.
    pub const OFFSET_NODE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;

    /// Create a new header with the given node type and a zero checksum.
    pub fn new(node_type: NodeType) -> Self {
        Self {
            tag: node_type as u8,
            checksum: 0,
        }
    }

    /// The decoded node type, if the tag is known.
    pub fn node_type(&self) -> Option<NodeType> {
        NodeType::from_u8(self.tag)
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < BlockHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for BlockHeader");

        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]);

        Self {
            tag: data[Self::OFFSET_NODE_TYPE],
            checksum: u32::from_le_bytes(checksum),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < BlockHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for BlockHeader");

        data[Self::OFFSET_NODE_TYPE] = self.tag;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
    }

    /// Compute CRC32 checksum of a block.
    ///
    /// The checksum field (bytes 1-4) is hashed as zeros, so the checksum
    /// doesn't include itself.
    pub fn compute_checksum(block_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();

        hasher.update(&block_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&block_data[Self::OFFSET_CHECKSUM + 4..]);

        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, block_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(block_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_from_u8() {
        assert_eq!(NodeType::from_u8(0), Some(NodeType::Invalid));
        assert_eq!(NodeType::from_u8(1), Some(NodeType::Superblock));
        assert_eq!(NodeType::from_u8(2), Some(NodeType::Root));
        assert_eq!(NodeType::from_u8(3), Some(NodeType::Interior));
        assert_eq!(NodeType::from_u8(4), Some(NodeType::Leaf));
        assert_eq!(NodeType::from_u8(5), Some(NodeType::Unallocated));
        assert_eq!(NodeType::from_u8(255), None);
    }

    #[test]
    fn test_is_interior() {
        assert!(NodeType::Root.is_interior());
        assert!(NodeType::Interior.is_interior());
        assert!(!NodeType::Leaf.is_interior());
        assert!(!NodeType::Unallocated.is_interior());
    }

    #[test]
    fn test_block_header_byte_layout() {
        let header = BlockHeader {
            tag: NodeType::Leaf as u8,
            checksum: 0x04030201,
        };

        let mut buffer = [0u8; BlockHeader::SIZE];
        header.write_to(&mut buffer);

        assert_eq!(buffer, [4, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(BlockHeader::from_bytes(&buffer), header);
    }

    #[test]
    fn test_checksum_ignores_checksum_field() {
        let mut data = [0u8; 512];
        data[100] = 0xAB;

        let checksum1 = BlockHeader::compute_checksum(&data);
        data[1..5].copy_from_slice(&[0xFF; 4]);
        let checksum2 = BlockHeader::compute_checksum(&data);

        assert_eq!(checksum1, checksum2);
    }

    #[test]
    fn test_checksum_changes_with_data() {
        let mut a = [0u8; 512];
        let mut b = [0u8; 512];
        a[500] = 0xFF;
        b[500] = 0xFE;

        assert_ne!(
            BlockHeader::compute_checksum(&a),
            BlockHeader::compute_checksum(&b)
        );
    }
}
