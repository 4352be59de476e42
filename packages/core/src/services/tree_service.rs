//! Tree Service - Core Business Logic Layer
//!
//! This module provides the engine operations over an owner's curriculum
//! forest:
//!
//! - Root provisioning and subtree retrieval (two store reads per subtree)
//! - Child construction and insertion along the type ladder
//! - Reparenting with descendant path rewrite and sibling renumbering
//! - Subtree deletion, value search, path and descendant-count lookups
//!
//! Every mutation holds the owner's lock from its first read to its last
//! write, so concurrent requests for one owner never plan against stale
//! sibling orders or paths.

use crate::config::TreeConfig;
use crate::db::{DomainEvent, NodeStore};
use crate::models::path::validate_id;
use crate::models::{
    normalize_value, plan_order, ChildInsertion, DeleteResult, Node, Placement, RelocationPlan,
    TreeNode, ValidationError,
};
use crate::services::error::TreeServiceError;
use crate::services::owner_locks::OwnerLocks;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast channel capacity for domain events
///
/// Subscribers that fall further behind than this observe a lag error and
/// resume from the newest events.
const DOMAIN_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Core service for tree operations
///
/// # Examples
///
/// ```no_run
/// use coursetree_core::db::MemoryStore;
/// use coursetree_core::services::TreeService;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = TreeService::new(Arc::new(MemoryStore::new()));
///
///     let tree = service.get_or_create_root_tree("user-1").await?;
///     let math = service.insert_child("user-1", &tree.node.id, "Math").await?;
///     println!("Created: {:?}", math.node());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TreeService {
    /// Persistence for all reads and writes
    store: Arc<dyn NodeStore>,

    config: Arc<TreeConfig>,

    /// Per-owner mutation serialization
    locks: Arc<OwnerLocks>,

    /// Broadcast channel for domain events
    event_tx: broadcast::Sender<DomainEvent>,
}

impl TreeService {
    /// Create a service with the default configuration
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::build(store, TreeConfig::default())
    }

    /// Create a service with a validated configuration
    pub fn with_config(
        store: Arc<dyn NodeStore>,
        config: TreeConfig,
    ) -> Result<Self, TreeServiceError> {
        config
            .validate()
            .map_err(|e| TreeServiceError::invalid_operation(format!("Invalid config: {}", e)))?;
        Ok(Self::build(store, config))
    }

    fn build(store: Arc<dyn NodeStore>, config: TreeConfig) -> Self {
        let (event_tx, _) = broadcast::channel(DOMAIN_EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            config: Arc::new(config),
            locks: Arc::new(OwnerLocks::new()),
            event_tx,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Subscribe to domain events emitted after successful mutations
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors when nobody is subscribed
    fn emit_event(&self, event: DomainEvent) {
        tracing::debug!("Emitting {} for owner {}", event.event_type(), event.owner_id());
        let _ = self.event_tx.send(event);
    }

    async fn require_node(&self, owner_id: &str, id: &str) -> Result<Node, TreeServiceError> {
        self.store
            .get_node(owner_id, id)
            .await?
            .ok_or_else(|| TreeServiceError::node_not_found(id))
    }

    /// Get a single node
    pub async fn get_node(&self, owner_id: &str, id: &str) -> Result<Option<Node>, TreeServiceError> {
        Ok(self.store.get_node(owner_id, id).await?)
    }

    /// The owner's whole tree, provisioning the root on first access
    pub async fn get_or_create_root_tree(&self, owner_id: &str) -> Result<TreeNode, TreeServiceError> {
        let root = {
            let _guard = self.locks.acquire(owner_id).await;
            match self.store.get_root(owner_id).await? {
                Some(root) => root,
                None => {
                    let candidate = Node::new_root(owner_id, self.config.root_value.as_str());
                    match self.store.create_node(candidate).await {
                        Ok(root) => {
                            tracing::info!("Provisioned root {} for owner {}", root.id, owner_id);
                            self.emit_event(DomainEvent::NodeCreated { node: root.clone() });
                            root
                        }
                        // Another process sharing the store may have provisioned it first
                        Err(err) => match self.store.get_root(owner_id).await? {
                            Some(root) => {
                                tracing::warn!(
                                    "Root creation for owner {} lost a race, using {}: {:#}",
                                    owner_id,
                                    root.id,
                                    err
                                );
                                root
                            }
                            None => return Err(TreeServiceError::query_failed(format!("{:#}", err))),
                        },
                    }
                }
            }
        };

        self.assemble_subtree(owner_id, root).await
    }

    /// Nested subtree rooted at `id`; `None` when the node does not exist
    pub async fn get_subtree(&self, owner_id: &str, id: &str) -> Result<Option<TreeNode>, TreeServiceError> {
        match self.store.get_node(owner_id, id).await? {
            Some(node) => Ok(Some(self.assemble_subtree(owner_id, node).await?)),
            None => Ok(None),
        }
    }

    async fn assemble_subtree(&self, owner_id: &str, root: Node) -> Result<TreeNode, TreeServiceError> {
        let descendants = self.store.get_descendants(owner_id, &root).await?;
        tracing::debug!("Assembling subtree of {} from {} descendants", root.id, descendants.len());
        Ok(TreeNode::assemble(root, descendants)?)
    }

    /// Compute the next child of `parent_id` without persisting it
    ///
    /// The child gets the next type on the ladder and the order after the
    /// parent's current last child (0 for the first child). A Workbook parent
    /// yields [`ChildInsertion::NotInsertable`].
    pub async fn build_child(
        &self,
        owner_id: &str,
        parent_id: &str,
        value: &str,
    ) -> Result<ChildInsertion, TreeServiceError> {
        let value = normalize_value(value, self.config.min_value_len, self.config.max_value_len)?;
        let parent = self.require_node(owner_id, parent_id).await?;

        if parent.node_type.is_leaf() {
            tracing::debug!("Parent {} is a {} and takes no children", parent.id, parent.node_type);
            return Ok(ChildInsertion::NotInsertable {
                parent_id: parent.id,
                parent_type: parent.node_type,
            });
        }

        let child_path = encoded_child_path(&parent)?;
        let order = self
            .store
            .max_child_order(owner_id, &child_path)
            .await?
            .map_or(0, |max| max + 1);

        let node = Node::new_child(&parent, value, order)?;
        Ok(ChildInsertion::Created { node })
    }

    /// Build the next child of `parent_id` and persist it
    pub async fn insert_child(
        &self,
        owner_id: &str,
        parent_id: &str,
        value: &str,
    ) -> Result<ChildInsertion, TreeServiceError> {
        let _guard = self.locks.acquire(owner_id).await;

        match self.build_child(owner_id, parent_id, value).await? {
            ChildInsertion::Created { node } => {
                let node = self.store.create_node(node).await?;
                tracing::info!(
                    "Inserted {} '{}' under {} at order {}",
                    node.node_type,
                    node.value,
                    parent_id,
                    node.order
                );
                self.emit_event(DomainEvent::NodeCreated { node: node.clone() });
                Ok(ChildInsertion::Created { node })
            }
            not_insertable => {
                tracing::warn!("Rejected insertion under leaf node {}", parent_id);
                Ok(not_insertable)
            }
        }
    }

    /// Move `node_id` and its subtree under `new_parent_id`
    ///
    /// Descendant paths are rewritten in bulk, the node's former slot among
    /// its old siblings is closed and a slot is opened among the new ones.
    /// Nothing is written when any lookup or check fails.
    ///
    /// Returns the moved node as stored.
    pub async fn change_parent(
        &self,
        owner_id: &str,
        node_id: &str,
        new_parent_id: &str,
        placement: Placement,
    ) -> Result<Node, TreeServiceError> {
        let _guard = self.locks.acquire(owner_id).await;

        let node = self.require_node(owner_id, node_id).await?;
        if node.is_root() {
            return Err(TreeServiceError::hierarchy_violation(format!(
                "Root node {} cannot be moved",
                node.id
            )));
        }

        let new_parent = self.require_node(owner_id, new_parent_id).await?;
        if new_parent.id == node.id || new_parent.materialized_path()?.contains(&node.id) {
            tracing::warn!("Rejected move of {} into its own subtree", node.id);
            return Err(TreeServiceError::circular_reference(format!(
                "{} is inside the subtree of {}",
                new_parent.id, node.id
            )));
        }
        if new_parent.node_type.child_type() != Some(node.node_type) {
            return Err(TreeServiceError::hierarchy_violation(format!(
                "A {} cannot be placed under a {}",
                node.node_type, new_parent.node_type
            )));
        }

        let new_path = encoded_child_path(&new_parent)?;
        let same_parent = node.path.as_deref() == Some(new_path.as_str());
        let siblings = self.store.get_children(owner_id, &new_path).await?;

        if let Placement::After(anchor_id) = &placement {
            if *anchor_id != node.id
                && !siblings.iter().any(|s| s.id == *anchor_id)
                && self.store.get_node(owner_id, anchor_id).await?.is_none()
            {
                return Err(TreeServiceError::node_not_found(anchor_id.as_str()));
            }
        }

        let new_order = plan_order(&node, &new_parent.id, same_parent, &siblings, &placement)?;
        if same_parent && new_order == node.order {
            tracing::debug!("Node {} already at order {} under {}", node.id, new_order, new_parent.id);
            return Ok(node);
        }

        let plan = RelocationPlan::new(&node, &new_parent, new_order)?;
        tracing::debug!(
            "Relocating {}: {} -> {} (order {} -> {})",
            plan.node_id,
            plan.old_path,
            plan.new_path,
            plan.old_order,
            plan.new_order
        );
        self.store.relocate_subtree(&plan).await?;

        tracing::info!(
            "Moved {} under {} at order {}",
            node.id,
            new_parent.id,
            new_order
        );
        self.emit_event(DomainEvent::NodeMoved {
            owner_id: owner_id.to_string(),
            node_id: node.id.clone(),
            new_parent_id: new_parent.id.clone(),
            order: new_order,
        });

        self.require_node(owner_id, &node.id).await
    }

    /// Delete `id` and every node below it
    ///
    /// Deleting a node that does not exist succeeds with
    /// [`DeleteResult::not_found`].
    pub async fn delete_subtree(&self, owner_id: &str, id: &str) -> Result<DeleteResult, TreeServiceError> {
        let _guard = self.locks.acquire(owner_id).await;

        let Some(node) = self.store.get_node(owner_id, id).await? else {
            tracing::debug!("Delete of missing node {} treated as success", id);
            return Ok(DeleteResult::not_found());
        };

        let deleted_count = self.store.delete_subtree(owner_id, &node).await?;
        tracing::info!("Deleted subtree of {} ({} nodes)", node.id, deleted_count);
        self.emit_event(DomainEvent::SubtreeDeleted {
            owner_id: owner_id.to_string(),
            node_id: node.id,
            deleted_count,
        });

        Ok(DeleteResult::deleted(deleted_count))
    }

    /// Subtrees of every node whose value contains `fragment` (case-insensitive)
    ///
    /// Each match is assembled independently, so a match nested inside another
    /// match appears both on its own and inside the enclosing subtree. A blank
    /// fragment matches nothing.
    pub async fn search(&self, owner_id: &str, fragment: &str) -> Result<Vec<TreeNode>, TreeServiceError> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self.store.search_by_value(owner_id, fragment).await?;
        tracing::debug!("Search '{}' for owner {} matched {} nodes", fragment, owner_id, matches.len());

        let mut trees = Vec::with_capacity(matches.len());
        for node in matches {
            trees.push(self.assemble_subtree(owner_id, node).await?);
        }
        Ok(trees)
    }

    /// Human-readable path of `id`; `None` when the node does not exist
    pub async fn get_human_readable_path(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<String>, TreeServiceError> {
        Ok(self
            .store
            .get_node(owner_id, id)
            .await?
            .map(|node| node.human_readable_path))
    }

    /// Number of nodes below `id` (0 when it does not exist)
    pub async fn count_descendants(&self, owner_id: &str, id: &str) -> Result<u64, TreeServiceError> {
        if validate_id(id).is_err() {
            return Ok(0);
        }
        Ok(self.store.count_descendants(owner_id, id).await?)
    }
}

fn encoded_child_path(parent: &Node) -> Result<String, ValidationError> {
    parent
        .child_path()?
        .encode()
        .ok_or_else(|| ValidationError::InvalidPath(format!("child path of {}", parent.id)))
}

// Engine behavior tests in separate module
#[cfg(test)]
#[path = "tree_service_test.rs"]
mod tree_service_test;
