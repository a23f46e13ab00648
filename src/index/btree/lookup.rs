//! Point lookup and in-place update.

use tracing::warn;

use crate::common::{BlockId, Error, Result};
use crate::index::btree::key::{Key, Value};
use crate::index::btree::tree::BTreeIndex;
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

/// What to do once descent reaches the leaf holding the key.
#[derive(Clone, Copy)]
enum Access<'v> {
    Read,
    Overwrite(&'v Value),
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Value stored under `key`.
    pub fn lookup(&self, key: &Key) -> Result<Value> {
        self.check_key(key)?;
        self.descend(self.root()?, key, Access::Read)
    }

    /// Replace the value stored under `key`. The key must already exist.
    pub fn update(&mut self, key: &Key, value: &Value) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;
        self.descend(self.root()?, key, Access::Overwrite(value))
            .map(|_| ())
    }

    /// Walk from `block_id` to the leaf that should hold `key`, then read or
    /// overwrite its value. Returns the value found before any overwrite.
    fn descend(&self, mut block_id: BlockId, key: &Key, access: Access<'_>) -> Result<Value> {
        let mut depth = 1;
        loop {
            self.check_depth(block_id, depth)?;
            let mut node = self.read_node(block_id)?;
            match node.node_type {
                NodeType::Root | NodeType::Interior => {
                    let slot = node.child_slot(key).ok_or(Error::NotFound)?;
                    block_id = node.children[slot];
                }
                NodeType::Leaf => {
                    let pos = node
                        .keys
                        .iter()
                        .position(|k| k == key)
                        .ok_or(Error::NotFound)?;
                    return match access {
                        Access::Read => Ok(node.values.swap_remove(pos)),
                        Access::Overwrite(value) => {
                            let old = std::mem::replace(&mut node.values[pos], value.clone());
                            self.write_node(block_id, &node)?;
                            Ok(old)
                        }
                    };
                }
                NodeType::Unallocated => {
                    warn!(block = block_id.0, "descent reached a freed leaf");
                    return Err(Error::NotFound);
                }
                other => panic!(
                    "descent from the root reached block {} of type {:?}",
                    block_id, other
                ),
            }
            depth += 1;
        }
    }
}
