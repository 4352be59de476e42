//! Data Models
//!
//! This module contains the data structures of the tree engine:
//!
//! - `Node` / `NodeType` - The node record and its typed depth ladder
//! - `path` - Materialized-path and human-readable-path codec
//! - `TreeNode` - Nested subtree built from a flat descendant set
//! - `RelocationPlan` / `Placement` - Precomputed writes for a reparent
//! - `ChildInsertion` / `DeleteResult` - Typed operation outcomes

mod node;
mod outcome;
pub mod path;
pub mod relocation;
mod tree;

pub use node::{normalize_value, Node, NodeType, ValidationError};
pub use outcome::{ChildInsertion, DeleteResult};
pub use path::MaterializedPath;
pub use relocation::{plan_order, Placement, PlacementError, RelocationPlan};
pub use tree::TreeNode;
