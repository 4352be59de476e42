//! Nested Subtree Assembly
//!
//! Builds a nested [`TreeNode`] from a subtree root and the flat list of its
//! descendants in a single pass. Together with the path-token query that loads
//! all descendants at once, a subtree of any depth costs exactly two reads.
//!
//! # Algorithm
//!
//! 1. Order descendants by `path` ascending, so every ancestor precedes its
//!    descendants (a path is a strict prefix of its children's paths)
//! 2. Seed a map `node id → children` with the root
//! 3. For each descendant, take the last id token of its path as its parent,
//!    append it to that parent's list and register its own empty list
//! 4. Attach the lists into nested nodes, each children list sorted by `order`
//!
//! A descendant whose parent has not been seen yet is an [`ValidationError::OrphanedNode`].

use crate::models::{Node, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node together with all of its descendants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: Node,

    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Assemble the subtree rooted at `root` from its flat descendant set
    pub fn assemble(root: Node, mut descendants: Vec<Node>) -> Result<Self, ValidationError> {
        descendants.sort_by(|a, b| a.path.cmp(&b.path));

        let mut children_of: HashMap<String, Vec<Node>> =
            HashMap::with_capacity(descendants.len() + 1);
        children_of.insert(root.id.clone(), Vec::new());

        for node in descendants {
            let parent_id = node
                .parent_id()?
                .ok_or_else(|| ValidationError::InvalidPath(format!("descendant {} has no path", node.id)))?;

            let id = node.id.clone();
            match children_of.get_mut(&parent_id) {
                Some(siblings) => siblings.push(node),
                None => return Err(ValidationError::OrphanedNode { id, parent_id }),
            }
            children_of.entry(id).or_default();
        }

        Ok(Self::attach(root, &mut children_of))
    }

    fn attach(node: Node, children_of: &mut HashMap<String, Vec<Node>>) -> Self {
        let mut children = children_of.remove(&node.id).unwrap_or_default();
        children.sort_by_key(|child| child.order);

        let children = children
            .into_iter()
            .map(|child| Self::attach(child, children_of))
            .collect();

        Self { node, children }
    }

    /// All nodes of this subtree in pre-order, root first
    pub fn nodes(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            out.push(&current.node);
            stack.extend(current.children.iter().rev());
        }
        out
    }

    /// Ids of every node below the root (the root itself excluded)
    pub fn descendant_ids(&self) -> Vec<String> {
        self.nodes()
            .into_iter()
            .skip(1)
            .map(|node| node.id.clone())
            .collect()
    }

    /// Number of nodes in this subtree, root included
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TreeNode::len).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Find a node anywhere in this subtree
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.node.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}
