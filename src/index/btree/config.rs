//! Tree configuration.

use crate::common::config::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use crate::common::{Error, Result};
use crate::index::btree::node::NodeLayout;

/// Smallest leaf capacity that still lets a leaf split into two non-empty halves.
pub const MIN_LEAF_SLOTS: usize = 2;

/// Smallest interior capacity that leaves a key on both sides of a split.
pub const MIN_INTERIOR_SLOTS: usize = 3;

/// Key and value widths for a tree.
///
/// The block size comes from the block store; [`BTreeConfig::validate`]
/// checks that the combination leaves room for enough slots per node.
///
/// # Example
/// ```
/// use blocktree::BTreeConfig;
///
/// let config = BTreeConfig::new(8, 8);
/// assert!(config.validate(512).is_ok());
/// assert!(config.validate(32).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeConfig {
    /// Width of every key in bytes.
    pub key_size: usize,
    /// Width of every value in bytes.
    pub value_size: usize,
}

impl BTreeConfig {
    pub fn new(key_size: usize, value_size: usize) -> Self {
        Self {
            key_size,
            value_size,
        }
    }

    /// The node layout these widths produce for `block_size` blocks.
    pub fn layout(&self, block_size: usize) -> NodeLayout {
        NodeLayout::new(self.key_size, self.value_size, block_size)
    }

    /// Validates the configuration against a block size.
    pub fn validate(&self, block_size: usize) -> Result<()> {
        if self.key_size == 0 || self.value_size == 0 {
            return Err(Error::InvalidConfig(
                "key and value sizes must be > 0".to_string(),
            ));
        }
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(Error::InvalidConfig(format!(
                "block size {} outside {}..={}",
                block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }

        let layout = self.layout(block_size);
        if layout.leaf_capacity() < MIN_LEAF_SLOTS {
            return Err(Error::InvalidConfig(format!(
                "block size {} fits only {} leaf slots (need {})",
                block_size,
                layout.leaf_capacity(),
                MIN_LEAF_SLOTS
            )));
        }
        if layout.interior_capacity() < MIN_INTERIOR_SLOTS {
            return Err(Error::InvalidConfig(format!(
                "block size {} fits only {} interior slots (need {})",
                block_size,
                layout.interior_capacity(),
                MIN_INTERIOR_SLOTS
            )));
        }
        Ok(())
    }
}
