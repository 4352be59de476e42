//! CourseTree Core Tree Engine
//!
//! This crate provides the materialized-path tree engine behind the CourseTree
//! curriculum organizer: per-owner forests of `Subjects → Lessons → Modules →
//! Workbooks`, with single-pass subtree assembly, typed child insertion,
//! reparenting with sibling renumbering, subtree deletion and search.
//!
//! # Architecture
//!
//! - **Materialized paths**: every node stores its ancestor ids as `,a,b,`, so
//!   subtree reads and deletes are one path-token query
//! - **libsql/Turso**: embedded SQLite-compatible persistence, with an
//!   in-process store for tests and embedding
//! - **Owner partitioning**: every operation is scoped by owner id
//!
//! # Modules
//!
//! - [`models`] - Node, path codec, subtree assembly, move planning
//! - [`db`] - `NodeStore` trait with libsql and in-memory implementations
//! - [`services`] - `TreeService` engine operations
//! - [`config`] - Engine configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::TreeConfig;
pub use models::*;
pub use services::*;
