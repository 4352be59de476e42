//! Typed Operation Outcomes
//!
//! Operations that used to signal "nothing happened" with an empty return
//! report it explicitly instead.

use crate::models::{Node, NodeType};
use serde::{Deserialize, Serialize};

/// Result of asking a parent for a new child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChildInsertion {
    /// The child record (saved or not, depending on the operation)
    Created { node: Node },

    /// The parent's type is a leaf and cannot hold children
    #[serde(rename_all = "camelCase")]
    NotInsertable {
        parent_id: String,
        parent_type: NodeType,
    },
}

impl ChildInsertion {
    /// The created node, if any
    pub fn node(&self) -> Option<&Node> {
        match self {
            ChildInsertion::Created { node } => Some(node),
            ChildInsertion::NotInsertable { .. } => None,
        }
    }

    pub fn into_node(self) -> Option<Node> {
        match self {
            ChildInsertion::Created { node } => Some(node),
            ChildInsertion::NotInsertable { .. } => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ChildInsertion::Created { .. })
    }
}

/// Result of a subtree delete operation
///
/// Deleting a node that does not exist is an idempotent success.
///
/// # Examples
///
/// ```rust
/// # use coursetree_core::models::DeleteResult;
/// let result = DeleteResult::not_found();
/// assert!(!result.existed);
/// assert_eq!(result.deleted_count, 0);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Whether the subtree root existed before deletion
    pub existed: bool,

    /// Nodes removed, subtree root included
    pub deleted_count: u64,
}

impl DeleteResult {
    pub fn deleted(deleted_count: u64) -> Self {
        Self {
            existed: true,
            deleted_count,
        }
    }

    pub fn not_found() -> Self {
        Self {
            existed: false,
            deleted_count: 0,
        }
    }
}
