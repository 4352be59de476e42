//! Service Layer Error Types
//!
//! Errors returned by [`TreeService`](crate::services::TreeService) operations.

use crate::db::DatabaseError;
use crate::models::{PlacementError, ValidationError};
use thiserror::Error;

/// Tree operation errors
#[derive(Error, Debug)]
pub enum TreeServiceError {
    /// Node not found by ID (or not owned by the caller)
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Request is well-formed but cannot be applied
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Validation failed for node shape or path
    #[error("Node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    /// Move would place a node inside its own subtree
    #[error("Circular reference detected: {context}")]
    CircularReference { context: String },

    /// Type ladder or root constraint violated
    #[error("Hierarchy constraint violated: {0}")]
    HierarchyViolation(String),

    /// Store query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl TreeServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Create a circular reference error
    pub fn circular_reference(context: impl Into<String>) -> Self {
        Self::CircularReference {
            context: context.into(),
        }
    }

    /// Create a hierarchy violation error
    pub fn hierarchy_violation(msg: impl Into<String>) -> Self {
        Self::HierarchyViolation(msg.into())
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }
}

impl From<PlacementError> for TreeServiceError {
    fn from(err: PlacementError) -> Self {
        Self::InvalidOperation(err.to_string())
    }
}

impl From<anyhow::Error> for TreeServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::QueryFailed(format!("{:#}", err))
    }
}
