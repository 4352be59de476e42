//! Domain Events
//!
//! Structural changes to an owner's forest are announced on a tokio broadcast
//! channel after the corresponding writes succeed, so callers (for example a
//! UI layer pushing updates) can react without polling.

use crate::models::Node;
use serde::{Deserialize, Serialize};

/// Domain events emitted by the tree engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    /// A node was inserted (root provisioning included)
    NodeCreated { node: Node },

    /// A node and its subtree were moved under a new parent
    #[serde(rename_all = "camelCase")]
    NodeMoved {
        owner_id: String,
        node_id: String,
        new_parent_id: String,
        order: i64,
    },

    /// A node and all of its descendants were removed
    #[serde(rename_all = "camelCase")]
    SubtreeDeleted {
        owner_id: String,
        node_id: String,
        deleted_count: u64,
    },
}

impl DomainEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::NodeCreated { .. } => "node_created",
            DomainEvent::NodeMoved { .. } => "node_moved",
            DomainEvent::SubtreeDeleted { .. } => "subtree_deleted",
        }
    }

    /// Owner whose forest changed
    pub fn owner_id(&self) -> &str {
        match self {
            DomainEvent::NodeCreated { node } => &node.owner_id,
            DomainEvent::NodeMoved { owner_id, .. } => owner_id,
            DomainEvent::SubtreeDeleted { owner_id, .. } => owner_id,
        }
    }
}
