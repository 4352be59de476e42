//! Node Data Structures
//!
//! This module defines the `Node` record, the only entity in a CourseTree forest,
//! and the closed `NodeType` ladder that fixes each node's depth.
//!
//! # Architecture
//!
//! - **Typed depth**: `Root → Subject → Lesson → Module → Workbook`, rank = depth
//! - **Materialized path**: each node stores its ancestor ids (see [`crate::models::path`])
//! - **Owner partitioning**: every node belongs to exactly one owner
//!
//! # Examples
//!
//! ```rust
//! use coursetree_core::models::{Node, NodeType};
//!
//! let root = Node::new_root("user-1", "Subjects");
//! let math = Node::new_child(&root, "Math", 0).unwrap();
//!
//! assert_eq!(math.node_type, NodeType::Subject);
//! assert_eq!(math.path.as_deref(), Some(format!(",{},", root.id).as_str()));
//! assert_eq!(math.human_readable_path, "/Subjects/");
//! ```

use crate::models::path::{
    child_human_readable_path, MaterializedPath, ROOT_HUMAN_READABLE_PATH,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for node shape and tree structure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid node ID format: {0}")]
    InvalidId(String),

    #[error("Invalid materialized path: {0}")]
    InvalidPath(String),

    #[error("Invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("Value must be between {min} and {max} characters, got {len}")]
    InvalidValueLength { len: usize, min: usize, max: usize },

    #[error("Node {id} references parent {parent_id} which is not part of the subtree")]
    OrphanedNode { id: String, parent_id: String },
}

/// Node type, strictly ordered by depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Root,
    Subject,
    Lesson,
    Module,
    Workbook,
}

impl NodeType {
    /// All node types in rank order
    pub const ALL: [NodeType; 5] = [
        NodeType::Root,
        NodeType::Subject,
        NodeType::Lesson,
        NodeType::Module,
        NodeType::Workbook,
    ];

    /// Depth of nodes of this type (Root = 0)
    pub fn rank(self) -> u8 {
        match self {
            NodeType::Root => 0,
            NodeType::Subject => 1,
            NodeType::Lesson => 2,
            NodeType::Module => 3,
            NodeType::Workbook => 4,
        }
    }

    /// Type of this type's children; `None` past Workbook
    pub fn child_type(self) -> Option<NodeType> {
        match self {
            NodeType::Root => Some(NodeType::Subject),
            NodeType::Subject => Some(NodeType::Lesson),
            NodeType::Lesson => Some(NodeType::Module),
            NodeType::Module => Some(NodeType::Workbook),
            NodeType::Workbook => None,
        }
    }

    /// Workbooks are leaves
    pub fn is_leaf(self) -> bool {
        self.child_type().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Root => "Root",
            NodeType::Subject => "Subject",
            NodeType::Lesson => "Lesson",
            NodeType::Module => "Module",
            NodeType::Workbook => "Workbook",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidNodeType(s.to_string()))
    }
}

/// A node in an owner's curriculum forest.
///
/// # Fields
///
/// - `id`: Unique identifier (UUID v4), never contains the path delimiter
/// - `node_type`: Depth-determining type (serialized as `type`)
/// - `value`: Display label
/// - `order`: Rank among siblings, contiguous from 0
/// - `path`: Encoded ancestor ids, `None` for the root
/// - `human_readable_path`: Encoded ancestor values, `/` for the root
/// - `owner_id`: Owning user (serialized as `belongsTo`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    pub value: String,

    pub order: i64,

    #[serde(default)]
    pub path: Option<String>,

    pub human_readable_path: String,

    #[serde(rename = "belongsTo")]
    pub owner_id: String,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,
}

impl Node {
    /// Create an owner's root node
    pub fn new_root(owner_id: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            node_type: NodeType::Root,
            value: value.into(),
            order: 0,
            path: None,
            human_readable_path: ROOT_HUMAN_READABLE_PATH.to_string(),
            owner_id: owner_id.into(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Create the next-typed child of `parent` at the given sibling rank
    ///
    /// The child inherits the parent's owner. Fails when the parent is a leaf
    /// or its stored path is malformed.
    pub fn new_child(
        parent: &Node,
        value: impl Into<String>,
        order: i64,
    ) -> Result<Self, ValidationError> {
        let node_type = parent.node_type.child_type().ok_or_else(|| {
            ValidationError::InvalidNodeType(format!(
                "{} nodes cannot have children",
                parent.node_type
            ))
        })?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            node_type,
            value: value.into(),
            order,
            path: parent.child_path()?.encode(),
            human_readable_path: parent.child_human_readable_path(),
            owner_id: parent.owner_id.clone(),
            created_at: now,
            modified_at: now,
        })
    }

    /// Decoded ancestor chain
    pub fn materialized_path(&self) -> Result<MaterializedPath, ValidationError> {
        MaterializedPath::parse(self.path.as_deref())
    }

    /// Path every direct child of this node carries
    pub fn child_path(&self) -> Result<MaterializedPath, ValidationError> {
        self.materialized_path()?.child(&self.id)
    }

    /// Human-readable path every direct child of this node carries
    pub fn child_human_readable_path(&self) -> String {
        child_human_readable_path(&self.human_readable_path, &self.value)
    }

    /// Immediate parent id; `None` for a root
    pub fn parent_id(&self) -> Result<Option<String>, ValidationError> {
        Ok(self.materialized_path()?.parent_id().map(str::to_string))
    }

    pub fn is_root(&self) -> bool {
        self.path.as_deref().map_or(true, str::is_empty)
    }
}

/// Trim a caller-supplied value and check its length bounds (in characters)
pub fn normalize_value(value: &str, min: usize, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(ValidationError::InvalidValueLength { len, min, max });
    }
    Ok(trimmed.to_string())
}
