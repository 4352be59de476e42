//! TursoStore - NodeStore Implementation for libsql/Turso
//!
//! Wraps [`DatabaseService`] and maps its rows into [`Node`] values.
//!
//! # Architecture
//!
//! ```text
//! TreeService
//!     ↓
//! Arc<dyn NodeStore>
//!     ↓
//! TursoStore (this module)
//!     ↓
//! DatabaseService (SQL + transactions)
//!     ↓
//! libsql
//! ```
//!
//! Search fetches an owner's rows and filters them here, since SQLite's
//! `lower()` only folds ASCII.

use crate::db::database::{DatabaseService, DbCreateNodeParams};
use crate::db::node_store::NodeStore;
use crate::models::path::descendant_token;
use crate::models::{Node, NodeType, RelocationPlan};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Row, Rows};
use std::str::FromStr;
use std::sync::Arc;

/// libsql-backed node store
#[derive(Debug, Clone)]
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Underlying database service
    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Parse a stored timestamp
    ///
    /// Accepts SQLite's `CURRENT_TIMESTAMP` form ("YYYY-MM-DD HH:MM:SS") as
    /// well as RFC3339, which is what this store writes.
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        Err(anyhow::anyhow!(
            "Unable to parse timestamp '{}' as RFC3339 or SQLite format",
            s
        ))
    }

    /// Convert a row selected with `NODE_COLUMNS` into a Node
    fn row_to_node(row: &Row) -> Result<Node> {
        let id: String = row.get(0).context("Failed to get id")?;
        let owner_id: String = row.get(1).context("Failed to get owner_id")?;
        let node_type: String = row.get(2).context("Failed to get node_type")?;
        let value: String = row.get(3).context("Failed to get value")?;
        let order: i64 = row.get(4).context("Failed to get sort_order")?;
        let path: Option<String> = row.get(5).context("Failed to get path")?;
        let human_readable_path: String =
            row.get(6).context("Failed to get human_readable_path")?;
        let created_at_str: String = row.get(7).context("Failed to get created_at")?;
        let modified_at_str: String = row.get(8).context("Failed to get modified_at")?;

        let node_type = NodeType::from_str(&node_type)
            .with_context(|| format!("Invalid node_type on node {}", id))?;
        let created_at =
            Self::parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
        let modified_at =
            Self::parse_timestamp(&modified_at_str).context("Failed to parse modified_at")?;

        Ok(Node {
            id,
            node_type,
            value,
            order,
            path,
            human_readable_path,
            owner_id,
            created_at,
            modified_at,
        })
    }

    /// Decode the next row while the cursor still points at it
    async fn next_node(rows: &mut Rows) -> Result<Option<Node>> {
        match rows.next().await.context("Failed to fetch row")? {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn collect_nodes(mut rows: Rows) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        while let Some(node) = Self::next_node(&mut rows).await? {
            nodes.push(node);
        }
        Ok(nodes)
    }
}

#[async_trait]
impl NodeStore for TursoStore {
    async fn create_node(&self, node: Node) -> Result<Node> {
        let created_at = node.created_at.to_rfc3339();
        let modified_at = node.modified_at.to_rfc3339();

        self.db
            .db_create_node(DbCreateNodeParams {
                id: &node.id,
                owner_id: &node.owner_id,
                node_type: node.node_type.as_str(),
                value: &node.value,
                sort_order: node.order,
                path: node.path.as_deref(),
                human_readable_path: &node.human_readable_path,
                created_at: &created_at,
                modified_at: &modified_at,
            })
            .await
            .with_context(|| format!("Failed to create node {}", node.id))?;

        Ok(node)
    }

    async fn get_node(&self, owner_id: &str, id: &str) -> Result<Option<Node>> {
        let mut rows = self.db.db_get_node(owner_id, id).await?;
        Self::next_node(&mut rows).await
    }

    async fn get_root(&self, owner_id: &str) -> Result<Option<Node>> {
        let mut rows = self.db.db_get_root(owner_id).await?;
        Self::next_node(&mut rows).await
    }

    async fn get_descendants(&self, owner_id: &str, node: &Node) -> Result<Vec<Node>> {
        let rows = self
            .db
            .db_get_descendants(owner_id, &descendant_token(&node.id))
            .await?;
        Self::collect_nodes(rows).await
    }

    async fn count_descendants(&self, owner_id: &str, id: &str) -> Result<u64> {
        Ok(self
            .db
            .db_count_descendants(owner_id, &descendant_token(id))
            .await?)
    }

    async fn get_children(&self, owner_id: &str, child_path: &str) -> Result<Vec<Node>> {
        let rows = self.db.db_get_children(owner_id, child_path).await?;
        Self::collect_nodes(rows).await
    }

    async fn max_child_order(&self, owner_id: &str, child_path: &str) -> Result<Option<i64>> {
        Ok(self.db.db_max_child_order(owner_id, child_path).await?)
    }

    async fn search_by_value(&self, owner_id: &str, fragment: &str) -> Result<Vec<Node>> {
        let needle = fragment.to_lowercase();
        let mut rows = self.db.db_get_owner_nodes(owner_id).await?;

        let mut matches = Vec::new();
        while let Some(node) = Self::next_node(&mut rows).await? {
            if node.value.to_lowercase().contains(&needle) {
                matches.push(node);
            }
        }
        Ok(matches)
    }

    async fn relocate_subtree(&self, plan: &RelocationPlan) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db
            .db_relocate_subtree(plan, &descendant_token(&plan.node_id), &now)
            .await
            .with_context(|| format!("Failed to relocate node {}", plan.node_id))?;
        Ok(())
    }

    async fn delete_subtree(&self, owner_id: &str, node: &Node) -> Result<u64> {
        let removed = self
            .db
            .db_delete_subtree(
                owner_id,
                &node.id,
                &descendant_token(&node.id),
                node.path.as_deref().filter(|p| !p.is_empty()),
                node.order,
            )
            .await
            .with_context(|| format!("Failed to delete subtree of {}", node.id))?;
        Ok(removed)
    }
}
