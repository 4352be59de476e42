//! NodeStore Trait - Repository Abstraction
//!
//! This module defines the `NodeStore` trait the tree engine reads and writes
//! through. Engine operations receive the store as `Arc<dyn NodeStore>`, so they
//! run unchanged against the in-process [`MemoryStore`](crate::db::MemoryStore)
//! or the libsql-backed [`TursoStore`](crate::db::TursoStore).
//!
//! # Design Decisions
//!
//! 1. **Owner-scoped**: every query and bulk write takes the owner id; a store
//!    never returns or touches another owner's nodes
//! 2. **Bounded-token matching**: descendants are the nodes whose path contains
//!    `,<id>,`, never a bare substring of the id
//! 3. **Composite writes are atomic**: `relocate_subtree` and `delete_subtree`
//!    apply all of their writes as one unit (one SQL transaction, or one lock)
//! 4. **Error Handling**: uses `anyhow::Result` for flexible error context
//!
//! # Examples
//!
//! ```rust,no_run
//! use coursetree_core::db::{MemoryStore, NodeStore};
//! use coursetree_core::models::Node;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store: Arc<dyn NodeStore> = Arc::new(MemoryStore::new());
//!
//!     let root = store.create_node(Node::new_root("user-1", "Subjects")).await?;
//!     let tree_ids = store.get_descendants("user-1", &root).await?;
//!     assert!(tree_ids.is_empty());
//!     Ok(())
//! }
//! ```

use crate::models::{Node, RelocationPlan};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence operations the tree engine needs
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so the engine can share them across
/// tasks.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Persist a new node and return it as stored
    ///
    /// Fails on duplicate ids and on a second root for the same owner.
    async fn create_node(&self, node: Node) -> Result<Node>;

    /// Get a node by id within an owner's forest
    ///
    /// - `Ok(Some(node))` if the node exists and belongs to `owner_id`
    /// - `Ok(None)` otherwise (not an error)
    async fn get_node(&self, owner_id: &str, id: &str) -> Result<Option<Node>>;

    /// The owner's root node, if provisioned
    async fn get_root(&self, owner_id: &str) -> Result<Option<Node>>;

    /// Every descendant of `node`, ordered by `path` ascending
    ///
    /// Ancestors always precede their descendants in the result.
    async fn get_descendants(&self, owner_id: &str, node: &Node) -> Result<Vec<Node>>;

    /// Number of nodes whose path contains `id` as a bounded token
    async fn count_descendants(&self, owner_id: &str, id: &str) -> Result<u64>;

    /// Direct children of the parent whose children carry `child_path`, ordered by `order`
    async fn get_children(&self, owner_id: &str, child_path: &str) -> Result<Vec<Node>>;

    /// Highest `order` among the children carrying `child_path`; `None` when there are none
    async fn max_child_order(&self, owner_id: &str, child_path: &str) -> Result<Option<i64>>;

    /// Nodes whose value contains `fragment`, case-insensitively
    ///
    /// Results are ordered by path (ancestors first), then by order.
    async fn search_by_value(&self, owner_id: &str, fragment: &str) -> Result<Vec<Node>>;

    /// Apply every write of a move as one unit
    async fn relocate_subtree(&self, plan: &RelocationPlan) -> Result<()>;

    /// Delete `node` and all of its descendants as one unit, closing its slot
    /// among its former siblings
    ///
    /// Returns the number of nodes removed (0 if `node` was already gone).
    async fn delete_subtree(&self, owner_id: &str, node: &Node) -> Result<u64>;
}
