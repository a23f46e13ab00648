//! The B-tree facade.

use tracing::info;

use crate::common::{BlockId, Error, Result};
use crate::index::btree::config::BTreeConfig;
use crate::index::btree::key::{Key, Value};
use crate::index::btree::node::{Node, NodeLayout};
use crate::index::btree::superblock::Superblock;
use crate::storage::BlockStore;

/// A disk-backed B-tree over a [`BlockStore`].
///
/// The tree lives entirely in the store: block 0 holds the [`Superblock`],
/// every other block is a node or a free-list entry. The only in-memory
/// state is a copy of the superblock, which is written back whenever the
/// root or free-list head changes.
///
/// Mutations take `&mut self`; one tree instance serves one caller at a
/// time.
///
/// # Example
/// ```
/// use blocktree::{BTreeConfig, BTreeIndex, BlockId, Key, MemoryBlockStore, Value};
///
/// let store = MemoryBlockStore::new(512, 64);
/// let mut tree = BTreeIndex::new(store, BTreeConfig::new(8, 8));
/// tree.attach(BlockId::SUPERBLOCK, true).unwrap();
///
/// tree.insert(&Key::from_u64(1), &Value::from_u64(100)).unwrap();
/// assert_eq!(tree.lookup(&Key::from_u64(1)).unwrap(), Value::from_u64(100));
/// tree.detach().unwrap();
/// ```
pub struct BTreeIndex<S: BlockStore> {
    pub(super) store: S,
    pub(super) config: BTreeConfig,
    pub(super) superblock: Option<Superblock>,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Create a detached tree. Call [`attach`](Self::attach) before use.
    pub fn new(store: S, config: BTreeConfig) -> Self {
        Self {
            store,
            config,
            superblock: None,
        }
    }

    /// Format (`create == true`) or mount the tree whose superblock is at
    /// `block_id`, which must be block 0.
    ///
    /// Formatting writes the superblock, an empty root at block 1, and
    /// chains every remaining block onto the free list in ascending order.
    pub fn attach(&mut self, block_id: BlockId, create: bool) -> Result<()> {
        if block_id != BlockId::SUPERBLOCK {
            return Err(Error::InvalidConfig(format!(
                "superblock must live at block 0, not {}",
                block_id
            )));
        }
        if create {
            self.format()?;
        }

        let block = self.store.read_block(BlockId::SUPERBLOCK)?;
        let superblock = Superblock::decode(&block)?;
        self.check_layout(&superblock.layout)?;

        info!(
            root = superblock.root.0,
            blocks = superblock.block_count,
            "mounted tree"
        );
        self.superblock = Some(superblock);
        Ok(())
    }

    /// Write the superblock back, flush the store and detach.
    ///
    /// Nodes are written by the operations that change them, so the
    /// superblock is the only state written here.
    pub fn detach(&mut self) -> Result<()> {
        self.persist_superblock()?;
        self.store.flush()?;
        if let Some(sb) = self.superblock.take() {
            info!(root = sb.root.0, "detached tree");
        }
        Ok(())
    }

    /// Whether [`attach`](Self::attach) has succeeded and no
    /// [`detach`](Self::detach) has happened since.
    pub fn is_attached(&self) -> bool {
        self.superblock.is_some()
    }

    /// The current root block.
    pub fn root(&self) -> Result<BlockId> {
        Ok(self.superblock()?.root)
    }

    /// Head of the free list, `None` when exhausted.
    pub fn free_list_head(&self) -> Result<Option<BlockId>> {
        Ok(self.superblock()?.free_list_head)
    }

    pub fn config(&self) -> &BTreeConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back. Detach first to persist the superblock.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Read and decode a node block. Exposed for diagnostics and tests.
    pub fn read_node(&self, block_id: BlockId) -> Result<Node> {
        let layout = self.layout()?;
        let block = self.store.read_block(block_id)?;
        Node::decode(block_id, &block, layout)
    }

    fn format(&mut self) -> Result<()> {
        let block_size = self.store.block_size();
        self.config.validate(block_size)?;
        let block_count = self.store.block_count();
        if block_count < 2 {
            return Err(Error::InvalidConfig(format!(
                "a tree needs at least 2 blocks, store has {}",
                block_count
            )));
        }

        let layout = self.config.layout(block_size);
        let root = BlockId(1);
        let superblock = Superblock {
            layout,
            root,
            free_list_head: (block_count > 2).then_some(BlockId(2)),
            block_count,
        };

        self.store
            .write_block(BlockId::SUPERBLOCK, &superblock.encode())?;
        self.store.notify_allocated(BlockId::SUPERBLOCK);
        self.store
            .write_block(root, &Node::empty_root(layout).encode(root)?)?;
        self.store.notify_allocated(root);

        for id in 2..block_count {
            let next = (id + 1 < block_count).then_some(BlockId(id + 1));
            let free = Node::unallocated(layout, next);
            self.store.write_block(BlockId(id), &free.encode(BlockId(id))?)?;
        }

        info!(
            block_size,
            key_size = layout.key_size,
            value_size = layout.value_size,
            blocks = block_count,
            "formatted tree"
        );
        Ok(())
    }

    fn check_layout(&self, stored: &NodeLayout) -> Result<()> {
        if stored.block_size != self.store.block_size() {
            return Err(Error::SizeMismatch {
                what: "block",
                expected: self.store.block_size(),
                actual: stored.block_size,
            });
        }
        if stored.key_size != self.config.key_size {
            return Err(Error::SizeMismatch {
                what: "key",
                expected: self.config.key_size,
                actual: stored.key_size,
            });
        }
        if stored.value_size != self.config.value_size {
            return Err(Error::SizeMismatch {
                what: "value",
                expected: self.config.value_size,
                actual: stored.value_size,
            });
        }
        Ok(())
    }

    pub(super) fn superblock(&self) -> Result<&Superblock> {
        self.superblock.as_ref().ok_or(Error::NotAttached)
    }

    pub(super) fn superblock_mut(&mut self) -> Result<&mut Superblock> {
        self.superblock.as_mut().ok_or(Error::NotAttached)
    }

    pub(super) fn layout(&self) -> Result<NodeLayout> {
        Ok(self.superblock()?.layout)
    }

    /// Fail a descent that has reached `depth` levels at `block_id` when
    /// that is more levels than the store has blocks. Only a child pointer
    /// leading back to an ancestor gets that deep.
    pub(super) fn check_depth(&self, block_id: BlockId, depth: u32) -> Result<()> {
        if depth > self.superblock()?.block_count {
            return Err(Error::corrupted(
                block_id.0,
                format!("descent reached depth {}, child pointers form a cycle", depth),
            ));
        }
        Ok(())
    }

    pub(super) fn write_node(&self, block_id: BlockId, node: &Node) -> Result<()> {
        let block = node.encode(block_id)?;
        self.store.write_block(block_id, &block)
    }

    pub(super) fn persist_superblock(&self) -> Result<()> {
        let block = self.superblock()?.encode();
        self.store.write_block(BlockId::SUPERBLOCK, &block)
    }

    pub(super) fn check_key(&self, key: &Key) -> Result<()> {
        if key.len() != self.config.key_size {
            return Err(Error::SizeMismatch {
                what: "key",
                expected: self.config.key_size,
                actual: key.len(),
            });
        }
        Ok(())
    }

    pub(super) fn check_value(&self, value: &Value) -> Result<()> {
        if value.len() != self.config.value_size {
            return Err(Error::SizeMismatch {
                what: "value",
                expected: self.config.value_size,
                actual: value.len(),
            });
        }
        Ok(())
    }
}
