//! Text dumps of the tree for debugging.
//!
//! Display only reads. A failure to decode a block is returned to the
//! caller and leaves the tree untouched.

use std::fmt::Write;
use std::str::FromStr;

use crate::common::{BlockId, Error, Result};
use crate::index::btree::node::Node;
use crate::index::btree::tree::BTreeIndex;
use crate::storage::block::NodeType;
use crate::storage::BlockStore;

/// Output style for [`BTreeIndex::display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayFormat {
    /// One line per node, contents only.
    Flat,
    /// One line per node, prefixed with the block id, depth first.
    #[default]
    Depth,
    /// Graphviz `dot` graph.
    DepthDot,
    /// Every key/value pair in key order, one `(key,value)` per line.
    SortedKeyValue,
}

impl FromStr for DisplayFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flat" => Ok(DisplayFormat::Flat),
            "depth" => Ok(DisplayFormat::Depth),
            "dot" => Ok(DisplayFormat::DepthDot),
            "sorted" => Ok(DisplayFormat::SortedKeyValue),
            other => Err(Error::InvalidConfig(format!(
                "unknown display format '{}'",
                other
            ))),
        }
    }
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Render the whole tree.
    pub fn display(&self, format: DisplayFormat) -> Result<String> {
        let mut out = String::new();
        let root = self.root()?;
        if format == DisplayFormat::DepthDot {
            out.push_str("digraph tree {\n");
        }
        self.display_node(root, format, 1, &mut out)?;
        if format == DisplayFormat::DepthDot {
            out.push_str("}\n");
        }
        Ok(out)
    }

    fn display_node(
        &self,
        block_id: BlockId,
        format: DisplayFormat,
        depth: u32,
        out: &mut String,
    ) -> Result<()> {
        self.check_depth(block_id, depth)?;
        let node = self.read_node(block_id)?;
        match node.node_type {
            NodeType::Root | NodeType::Interior | NodeType::Leaf | NodeType::Unallocated => {}
            other => {
                return Err(Error::corrupted(
                    block_id.0,
                    format!("{:?} block inside the tree", other),
                ))
            }
        }

        match format {
            DisplayFormat::Flat => {
                out.push_str(&describe(&node));
                out.push('\n');
            }
            DisplayFormat::Depth => {
                let _ = writeln!(out, "{}: {}", block_id, describe(&node));
            }
            DisplayFormat::DepthDot => {
                let _ = writeln!(out, "{} [ label=\"{}: {}\" ];", block_id, block_id, describe(&node));
                for child in &node.children {
                    let _ = writeln!(out, "{} -> {};", block_id, child);
                }
            }
            DisplayFormat::SortedKeyValue => {
                if node.node_type == NodeType::Leaf {
                    for (key, value) in node.keys.iter().zip(&node.values) {
                        let _ = writeln!(out, "({},{})", key, value);
                    }
                }
            }
        }

        for &child in &node.children {
            self.display_node(child, format, depth + 1, out)?;
        }
        Ok(())
    }
}

fn describe(node: &Node) -> String {
    let mut text = format!("{:?}:", node.node_type);
    match node.node_type {
        NodeType::Root | NodeType::Interior => {
            for (i, child) in node.children.iter().enumerate() {
                let _ = write!(text, " *{}", child);
                if let Some(key) = node.keys.get(i) {
                    let _ = write!(text, " {}", key);
                }
            }
        }
        NodeType::Leaf => {
            for (key, value) in node.keys.iter().zip(&node.values) {
                let _ = write!(text, " {}={}", key, value);
            }
        }
        _ => {}
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::btree::{BTreeConfig, Key, Value};
    use crate::storage::MemoryBlockStore;

    fn tree_with(keys: &[&str]) -> BTreeIndex<MemoryBlockStore> {
        let mut tree = BTreeIndex::new(
            MemoryBlockStore::new(512, 16),
            BTreeConfig::new(4, 4),
        );
        tree.attach(BlockId::SUPERBLOCK, true).unwrap();
        for k in keys {
            tree.insert(&Key::padded(k, 4), &Value::padded(&k.to_uppercase(), 4))
                .unwrap();
        }
        tree
    }

    #[test]
    fn test_depth() {
        let tree = tree_with(&["m", "c", "x"]);
        assert_eq!(
            tree.display(DisplayFormat::Depth).unwrap(),
            "1: Root: *2 m *3\n2: Leaf: c=C m=M\n3: Leaf: x=X\n"
        );
    }

    #[test]
    fn test_flat() {
        let tree = tree_with(&["m"]);
        assert_eq!(
            tree.display(DisplayFormat::Flat).unwrap(),
            "Root: *2 m *3\nLeaf: m=M\nLeaf:\n"
        );
    }

    #[test]
    fn test_dot() {
        let tree = tree_with(&["m"]);
        let dot = tree.display(DisplayFormat::DepthDot).unwrap();
        assert!(dot.starts_with("digraph tree {\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("1 -> 2;\n"));
        assert!(dot.contains("1 -> 3;\n"));
        assert!(dot.contains("2 [ label=\"2: Leaf: m=M\" ];"));
    }

    #[test]
    fn test_sorted() {
        let tree = tree_with(&["q", "b", "m", "z"]);
        assert_eq!(
            tree.display(DisplayFormat::SortedKeyValue).unwrap(),
            "(b,B)\n(m,M)\n(q,Q)\n(z,Z)\n"
        );
    }

    #[test]
    fn test_freed_leaf_rendered_as_unallocated() {
        let mut tree = tree_with(&["m", "x"]);
        tree.delete(&Key::padded("x", 4)).unwrap();
        assert_eq!(
            tree.display(DisplayFormat::Depth).unwrap(),
            "1: Root: *2 m *3\n2: Leaf: m=M\n3: Unallocated:\n"
        );
    }

    #[test]
    fn test_empty_tree() {
        let tree = tree_with(&[]);
        assert_eq!(tree.display(DisplayFormat::Depth).unwrap(), "1: Root:\n");
        assert_eq!(tree.display(DisplayFormat::SortedKeyValue).unwrap(), "");
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("dot".parse::<DisplayFormat>().unwrap(), DisplayFormat::DepthDot);
        assert!("tree".parse::<DisplayFormat>().is_err());
    }
}
