//! Structural consistency check.

use std::collections::HashSet;
use std::fmt;

use crate::common::{BlockId, Error, Result};
use crate::index::btree::key::Key;
use crate::index::btree::tree::BTreeIndex;
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

/// What [`BTreeIndex::sanity_check`] found in a consistent tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityReport {
    pub root: BlockId,
    /// Levels from the root down to the leaves, counting both.
    pub depth: usize,
    pub interior_nodes: usize,
    pub leaf_nodes: usize,
    pub keys: usize,
    pub free_blocks: usize,
    /// Child pointers that lead to a leaf freed by delete.
    pub dangling: Vec<BlockId>,
    /// Blocks neither reachable nor free, leaked by an operation that
    /// failed partway.
    pub orphaned: Vec<BlockId>,
}

impl fmt::Display for SanityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "root: {}, depth: {}, interior: {}, leaves: {}, keys: {}, free: {}, dangling: {}, orphaned: {}",
            self.root,
            self.depth,
            self.interior_nodes,
            self.leaf_nodes,
            self.keys,
            self.free_blocks,
            self.dangling.len(),
            self.orphaned.len()
        )
    }
}

/// Keys a subtree may hold: `lower < k <= upper`.
#[derive(Clone, Copy)]
struct Bounds<'a> {
    lower: Option<&'a Key>,
    upper: Option<&'a Key>,
}

impl Bounds<'_> {
    fn admits(&self, key: &Key) -> bool {
        self.lower.map_or(true, |lo| key > lo) && self.upper.map_or(true, |hi| key <= hi)
    }
}

struct Walk {
    free: HashSet<BlockId>,
    visited: HashSet<BlockId>,
    leaf_depth: Option<usize>,
    report: SanityReport,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Walk the free list and every node reachable from the root, checking
    /// that keys are sorted and within their separators' ranges, that nodes
    /// respect capacity, that leaves sit at one depth and that no block is
    /// both reachable and free.
    ///
    /// Leaves freed by delete are reported as dangling rather than as
    /// errors. Any other violation is [`Error::Corrupted`].
    pub fn sanity_check(&self) -> Result<SanityReport> {
        let sb = self.superblock()?;
        let free_list = self.free_blocks()?;

        let mut walk = Walk {
            free: free_list.iter().copied().collect(),
            visited: HashSet::new(),
            leaf_depth: None,
            report: SanityReport {
                root: sb.root,
                depth: 1,
                interior_nodes: 0,
                leaf_nodes: 0,
                keys: 0,
                free_blocks: free_list.len(),
                dangling: Vec::new(),
                orphaned: Vec::new(),
            },
        };

        let all = Bounds {
            lower: None,
            upper: None,
        };
        self.check_subtree(sb.root, all, 1, &mut walk)?;
        walk.report.depth = walk.leaf_depth.unwrap_or(1);

        walk.report.orphaned = (1..sb.block_count)
            .map(BlockId)
            .filter(|id| !walk.visited.contains(id) && !walk.free.contains(id))
            .collect();
        Ok(walk.report)
    }

    fn check_subtree(
        &self,
        block_id: BlockId,
        bounds: Bounds<'_>,
        depth: usize,
        walk: &mut Walk,
    ) -> Result<()> {
        let node = self.read_node(block_id)?;

        if node.node_type == NodeType::Unallocated {
            if walk.free.contains(&block_id) {
                walk.report.dangling.push(block_id);
                return Ok(());
            }
            return Err(Error::corrupted(
                block_id.0,
                "reachable free block is not on the free list",
            ));
        }
        if walk.free.contains(&block_id) {
            return Err(Error::corrupted(block_id.0, "reachable block is on the free list"));
        }
        if !walk.visited.insert(block_id) {
            return Err(Error::corrupted(block_id.0, "block reachable twice"));
        }

        let is_root = depth == 1;
        match (node.node_type, is_root) {
            (NodeType::Root, true) | (NodeType::Interior, false) | (NodeType::Leaf, false) => {}
            (other, _) => {
                return Err(Error::corrupted(
                    block_id.0,
                    format!("unexpected {:?} node at depth {}", other, depth),
                ))
            }
        }

        if node.keys.len() > node.layout.capacity(node.node_type) {
            return Err(Error::corrupted(block_id.0, "node over capacity"));
        }
        if node.keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::corrupted(block_id.0, "keys out of order"));
        }
        if let Some(key) = node.keys.iter().find(|k| !bounds.admits(k)) {
            return Err(Error::corrupted(
                block_id.0,
                format!("key {} outside its separators", key),
            ));
        }

        if node.node_type == NodeType::Leaf {
            match walk.leaf_depth {
                None => walk.leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return Err(Error::corrupted(
                        block_id.0,
                        format!("leaf at depth {}, expected {}", depth, d),
                    ))
                }
                Some(_) => {}
            }
            walk.report.leaf_nodes += 1;
            walk.report.keys += node.keys.len();
            return Ok(());
        }

        if node.keys.is_empty() {
            // Only an empty tree has a keyless root.
            if !is_root || !node.children.is_empty() {
                return Err(Error::corrupted(block_id.0, "interior node without keys"));
            }
            return Ok(());
        }
        if !is_root {
            walk.report.interior_nodes += 1;
        }

        for (i, &child) in node.children.iter().enumerate() {
            let child_bounds = Bounds {
                lower: if i == 0 { bounds.lower } else { node.keys.get(i - 1) },
                upper: node.keys.get(i).or(bounds.upper),
            };
            self.check_subtree(child, child_bounds, depth + 1, walk)?;
        }
        Ok(())
    }
}
