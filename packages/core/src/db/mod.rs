//! Database Layer
//!
//! This module handles all persistence for the tree engine:
//!
//! - The [`NodeStore`] trait every engine operation goes through
//! - [`TursoStore`]: libsql/Turso embedded database (one `nodes` table)
//! - [`MemoryStore`]: in-process store for tests, benches and embedders
//! - [`DomainEvent`]: change notifications emitted after successful writes
//!
//! # Architecture
//!
//! Both stores implement the same owner-scoped operations. Multi-row writes
//! (reparenting and subtree deletion) are applied atomically by each store.

mod database;
mod error;
pub mod events;
mod memory_store;
mod node_store;
mod turso_store;

pub use database::{DatabaseService, DbCreateNodeParams};
pub use error::DatabaseError;
pub use events::DomainEvent;
pub use memory_store::MemoryStore;
pub use node_store::NodeStore;
pub use turso_store::TursoStore;
