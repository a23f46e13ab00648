//! Free-list block allocator.
//!
//! Free blocks are tagged [`NodeType::Unallocated`] and linked through
//! their own `next_free` field; the superblock holds the head. Allocation
//! pops the head, deallocation pushes onto it.

use tracing::{debug, info};

use crate::common::{BlockId, Error, Result};
use crate::index::btree::node::Node;
use crate::index::btree::tree::BTreeIndex;
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

impl<S: BlockStore> BTreeIndex<S> {
    /// Pop the head of the free list.
    ///
    /// The returned block still holds its free-list encoding; the caller
    /// overwrites it with a real node.
    ///
    /// # Panics
    /// Panics if the head block is not tagged `Unallocated`.
    pub fn allocate_node(&mut self) -> Result<BlockId> {
        let head = self.superblock()?.free_list_head.ok_or(Error::NoSpace)?;
        let node = self.read_node(head)?;
        assert_eq!(
            node.node_type,
            NodeType::Unallocated,
            "free-list head {} is a {:?} block",
            head,
            node.node_type
        );

        self.superblock_mut()?.free_list_head = node.next_free;
        self.persist_superblock()?;
        self.store.notify_allocated(head);
        debug!(block = head.0, "allocated node");
        Ok(head)
    }

    /// Push `block_id` onto the free list.
    ///
    /// # Panics
    /// Panics on a double free, or when asked to free the superblock or the
    /// current root.
    pub fn deallocate_node(&mut self, block_id: BlockId) -> Result<()> {
        let sb = self.superblock()?;
        assert!(
            block_id != BlockId::SUPERBLOCK && block_id != sb.root,
            "attempt to free structural block {}",
            block_id
        );
        let (layout, head) = (sb.layout, sb.free_list_head);

        let node = self.read_node(block_id)?;
        assert_ne!(
            node.node_type,
            NodeType::Unallocated,
            "double free of block {}",
            block_id
        );

        self.write_node(block_id, &Node::unallocated(layout, head))?;
        self.superblock_mut()?.free_list_head = Some(block_id);
        self.persist_superblock()?;
        self.store.notify_deallocated(block_id);
        debug!(block = block_id.0, "deallocated node");
        Ok(())
    }

    /// Unlink a specific free block from wherever it sits in the free list
    /// and hand it to the caller, as [`allocate_node`](Self::allocate_node)
    /// does for the head.
    pub(super) fn claim_node(&mut self, block_id: BlockId) -> Result<()> {
        let sb = self.superblock()?;
        let limit = sb.block_count;
        let mut prev: Option<(BlockId, Node)> = None;
        let mut cursor = sb.free_list_head;

        for _ in 0..limit {
            let Some(current) = cursor else { break };
            let node = self.read_node(current)?;
            if node.node_type != NodeType::Unallocated {
                return Err(Error::corrupted(
                    current.0,
                    format!("free-list entry is a {:?} block", node.node_type),
                ));
            }

            if current == block_id {
                match prev {
                    None => {
                        self.superblock_mut()?.free_list_head = node.next_free;
                        self.persist_superblock()?;
                    }
                    Some((prev_id, mut prev_node)) => {
                        prev_node.next_free = node.next_free;
                        self.write_node(prev_id, &prev_node)?;
                    }
                }
                self.store.notify_allocated(block_id);
                debug!(block = block_id.0, "claimed free block");
                return Ok(());
            }

            cursor = node.next_free;
            prev = Some((current, node));
        }

        Err(Error::corrupted(
            block_id.0,
            "unallocated block is not on the free list",
        ))
    }

    /// Chain blocks the store gained since the tree last looked (after
    /// [`BlockStore::grow`]) onto the free list. Returns how many were added.
    ///
    /// This is the retry path for [`Error::NoSpace`].
    pub fn adopt_new_blocks(&mut self) -> Result<u32> {
        let sb = self.superblock()?;
        let (layout, known, old_head) = (sb.layout, sb.block_count, sb.free_list_head);
        let available = self.store.block_count();
        if available <= known {
            return Ok(0);
        }

        for id in known..available {
            let next = if id + 1 < available {
                Some(BlockId(id + 1))
            } else {
                old_head
            };
            self.write_node(BlockId(id), &Node::unallocated(layout, next))?;
        }

        let sb = self.superblock_mut()?;
        sb.free_list_head = Some(BlockId(known));
        sb.block_count = available;
        self.persist_superblock()?;

        let adopted = available - known;
        info!(adopted, blocks = available, "adopted new blocks");
        Ok(adopted)
    }

    /// Whether the free list holds at least `count` blocks. Follows at most
    /// `count` links.
    pub(super) fn has_free_blocks(&self, count: usize) -> Result<bool> {
        let mut cursor = self.superblock()?.free_list_head;
        for _ in 0..count {
            let Some(current) = cursor else {
                return Ok(false);
            };
            cursor = self.read_node(current)?.next_free;
        }
        Ok(true)
    }

    /// Walk the free list from the head.
    pub fn free_blocks(&self) -> Result<Vec<BlockId>> {
        let sb = self.superblock()?;
        let mut blocks = Vec::new();
        let mut cursor = sb.free_list_head;
        while let Some(current) = cursor {
            if blocks.len() as u32 >= sb.block_count {
                return Err(Error::corrupted(current.0, "free list has a cycle"));
            }
            let node = self.read_node(current)?;
            if node.node_type != NodeType::Unallocated {
                return Err(Error::corrupted(
                    current.0,
                    format!("free-list entry is a {:?} block", node.node_type),
                ));
            }
            blocks.push(current);
            cursor = node.next_free;
        }
        Ok(blocks)
    }
}
