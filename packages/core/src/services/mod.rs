//! Business Services
//!
//! This module contains the tree engine's business logic:
//!
//! - `TreeService` - Root provisioning, subtree assembly, insertion, moves,
//!   deletion and search over an owner's forest
//! - `OwnerLocks` - Per-owner serialization of mutations
//!
//! Services coordinate between the database layer and callers, enforcing the
//! type ladder, sibling ordering and owner scoping.

pub mod error;
pub mod owner_locks;
pub mod tree_service;

pub use error::TreeServiceError;
pub use owner_locks::OwnerLocks;
pub use tree_service::TreeService;
