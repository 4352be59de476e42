//! Database Connection Management
//!
//! This module provides the libsql/Turso connection and schema for the node
//! table, plus the raw SQL operations wrapped by [`TursoStore`](crate::db::TursoStore).
//!
//! # Architecture
//!
//! - **Single table**: `nodes`, one row per node, keyed by id
//! - **Owner partitioning**: every statement is scoped by `owner_id`
//! - **Path index**: `(owner_id, path)` backs sibling lookups; descendant
//!   selection uses the bounded token `instr(path, ',<id>,') > 0`
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Transactions**: relocation and subtree deletion run in one transaction
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions.** The 5-second busy
//! timeout lets concurrent writers wait instead of failing with `SQLITE_BUSY`.

use crate::db::error::DatabaseError;
use crate::models::RelocationPlan;
use libsql::{Builder, Connection, Database, Rows};
use std::path::PathBuf;
use std::sync::Arc;

/// Columns selected for every node query, in `TursoStore::row_to_node` order
pub(crate) const NODE_COLUMNS: &str =
    "id, owner_id, node_type, value, sort_order, path, human_readable_path, created_at, modified_at";

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use coursetree_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/coursetree.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

/// Parameters for node insertion (avoids too-many-arguments lint)
pub struct DbCreateNodeParams<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub node_type: &'a str,
    pub value: &'a str,
    pub sort_order: i64,
    pub path: Option<&'a str>,
    pub human_readable_path: &'a str,
    pub created_at: &'a str,
    pub modified_at: &'a str,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path` and initialize the schema
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema().await?;
        tracing::debug!("Database ready at {}", service.db_path.display());

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Create the `nodes` table and its indexes (idempotent)
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                node_type TEXT NOT NULL,
                value TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                -- ',<ancestor ids>,' root-to-parent; NULL for an owner's root
                path TEXT,
                human_readable_path TEXT NOT NULL DEFAULT '/',
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| DatabaseError::initialization_failed(format!("nodes table: {}", e)))?;

        let indexes = [
            (
                "idx_nodes_owner_path",
                "CREATE INDEX IF NOT EXISTS idx_nodes_owner_path ON nodes(owner_id, path)",
            ),
            (
                "idx_nodes_owner_root",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_owner_root ON nodes(owner_id) WHERE node_type = 'Root'",
            ),
        ];
        for (name, sql) in indexes {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!("index '{}': {}", name, e))
            })?;
        }

        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// Only for single-threaded contexts; async code should use
    /// `connect_with_timeout()`.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with a 5-second busy timeout configured
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect()?;
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        Ok(conn)
    }

    async fn query(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        context: &str,
    ) -> Result<Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        conn.query(sql, params).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute {} query: {}", context, e))
        })
    }

    /// Read a single integer aggregate; the value is decoded while the cursor sits on the row
    async fn query_scalar(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        context: &str,
    ) -> Result<Option<i64>, DatabaseError> {
        let mut rows = self.query(sql, params, context).await?;
        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", context, e)))?
        {
            Some(row) => row
                .get::<Option<i64>>(0)
                .map_err(|e| DatabaseError::invalid_row(format!("{}: {}", context, e))),
            None => Ok(None),
        }
    }

    /// Insert a node row
    pub async fn db_create_node(&self, params: DbCreateNodeParams<'_>) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            &format!(
                "INSERT INTO nodes ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                NODE_COLUMNS
            ),
            (
                params.id,
                params.owner_id,
                params.node_type,
                params.value,
                params.sort_order,
                params.path,
                params.human_readable_path,
                params.created_at,
                params.modified_at,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert node {}: {}", params.id, e)))?;

        Ok(())
    }

    /// Fetch one node row within an owner's forest
    pub async fn db_get_node(&self, owner_id: &str, id: &str) -> Result<Rows, DatabaseError> {
        self.query(
            &format!("SELECT {} FROM nodes WHERE owner_id = ?1 AND id = ?2", NODE_COLUMNS),
            (owner_id, id),
            "get_node",
        )
        .await
    }

    /// Fetch the owner's root row
    pub async fn db_get_root(&self, owner_id: &str) -> Result<Rows, DatabaseError> {
        self.query(
            &format!(
                "SELECT {} FROM nodes WHERE owner_id = ?1 AND node_type = 'Root' LIMIT 1",
                NODE_COLUMNS
            ),
            [owner_id],
            "get_root",
        )
        .await
    }

    /// Every row whose path contains `token`, ordered by path
    pub async fn db_get_descendants(&self, owner_id: &str, token: &str) -> Result<Rows, DatabaseError> {
        self.query(
            &format!(
                "SELECT {} FROM nodes WHERE owner_id = ?1 AND instr(path, ?2) > 0 ORDER BY path ASC",
                NODE_COLUMNS
            ),
            (owner_id, token),
            "get_descendants",
        )
        .await
    }

    /// Count rows whose path contains `token`
    pub async fn db_count_descendants(&self, owner_id: &str, token: &str) -> Result<u64, DatabaseError> {
        let count = self
            .query_scalar(
                "SELECT COUNT(*) FROM nodes WHERE owner_id = ?1 AND instr(path, ?2) > 0",
                (owner_id, token),
                "count_descendants",
            )
            .await?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    /// Direct children rows (path equal to `child_path`), ordered by sort_order
    pub async fn db_get_children(&self, owner_id: &str, child_path: &str) -> Result<Rows, DatabaseError> {
        self.query(
            &format!(
                "SELECT {} FROM nodes WHERE owner_id = ?1 AND path = ?2 ORDER BY sort_order ASC, id ASC",
                NODE_COLUMNS
            ),
            (owner_id, child_path),
            "get_children",
        )
        .await
    }

    /// Highest sort_order among direct children; `None` when there are none
    pub async fn db_max_child_order(&self, owner_id: &str, child_path: &str) -> Result<Option<i64>, DatabaseError> {
        self.query_scalar(
            "SELECT MAX(sort_order) FROM nodes WHERE owner_id = ?1 AND path = ?2",
            (owner_id, child_path),
            "max_child_order",
        )
        .await
    }

    /// All rows of an owner, ordered by path then sort_order
    pub async fn db_get_owner_nodes(&self, owner_id: &str) -> Result<Rows, DatabaseError> {
        self.query(
            &format!(
                "SELECT {} FROM nodes WHERE owner_id = ?1 ORDER BY path ASC, sort_order ASC",
                NODE_COLUMNS
            ),
            [owner_id],
            "get_owner_nodes",
        )
        .await
    }

    /// Apply a relocation plan in one transaction
    pub async fn db_relocate_subtree(
        &self,
        plan: &RelocationPlan,
        token: &str,
        now: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        match Self::relocate_in_transaction(&conn, plan, token, now).await {
            Ok(()) => {
                conn.execute("COMMIT", ()).await.map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
                })?;
                Ok(())
            }
            Err(e) => {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn relocate_in_transaction(
        conn: &Connection,
        plan: &RelocationPlan,
        token: &str,
        now: &str,
    ) -> Result<(), DatabaseError> {
        // Descendants: swap the moved node's old path prefixes for the new ones
        conn.execute(
            "UPDATE nodes SET
                path = CASE WHEN substr(path, 1, length(?2)) = ?2
                            THEN ?3 || substr(path, length(?2) + 1)
                            ELSE path END,
                human_readable_path = CASE WHEN substr(human_readable_path, 1, length(?4)) = ?4
                            THEN ?5 || substr(human_readable_path, length(?4) + 1)
                            ELSE human_readable_path END,
                modified_at = ?6
             WHERE owner_id = ?1 AND instr(path, ?7) > 0",
            (
                plan.owner_id.as_str(),
                plan.old_path.as_str(),
                plan.new_path.as_str(),
                plan.old_human_readable_path.as_str(),
                plan.new_human_readable_path.as_str(),
                now,
                token,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to rewrite descendant paths: {}", e)))?;

        // Close the old slot
        conn.execute(
            "UPDATE nodes SET sort_order = sort_order - 1, modified_at = ?4
             WHERE owner_id = ?1 AND path = ?2 AND sort_order > ?3 AND id <> ?5",
            (
                plan.owner_id.as_str(),
                plan.old_path.as_str(),
                plan.old_order,
                now,
                plan.node_id.as_str(),
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to close sibling slot: {}", e)))?;

        // Open the new slot
        conn.execute(
            "UPDATE nodes SET sort_order = sort_order + 1, modified_at = ?4
             WHERE owner_id = ?1 AND path = ?2 AND sort_order >= ?3 AND id <> ?5",
            (
                plan.owner_id.as_str(),
                plan.new_path.as_str(),
                plan.new_order,
                now,
                plan.node_id.as_str(),
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to open sibling slot: {}", e)))?;

        let moved = conn
            .execute(
                "UPDATE nodes SET path = ?3, human_readable_path = ?4, sort_order = ?5, modified_at = ?6
                 WHERE owner_id = ?1 AND id = ?2",
                (
                    plan.owner_id.as_str(),
                    plan.node_id.as_str(),
                    plan.new_path.as_str(),
                    plan.new_human_readable_path.as_str(),
                    plan.new_order,
                    now,
                ),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to move node: {}", e)))?;

        if moved != 1 {
            return Err(DatabaseError::sql_execution(format!(
                "Node {} disappeared before relocation",
                plan.node_id
            )));
        }

        Ok(())
    }

    /// Delete a node, its descendants, and close its sibling slot in one transaction
    ///
    /// Returns the number of rows removed.
    pub async fn db_delete_subtree(
        &self,
        owner_id: &str,
        id: &str,
        token: &str,
        sibling_path: Option<&str>,
        order: i64,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        match Self::delete_in_transaction(&conn, owner_id, id, token, sibling_path, order).await {
            Ok(removed) => {
                conn.execute("COMMIT", ()).await.map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
                })?;
                Ok(removed)
            }
            Err(e) => {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn delete_in_transaction(
        conn: &Connection,
        owner_id: &str,
        id: &str,
        token: &str,
        sibling_path: Option<&str>,
        order: i64,
    ) -> Result<u64, DatabaseError> {
        let descendants = conn
            .execute(
                "DELETE FROM nodes WHERE owner_id = ?1 AND instr(path, ?2) > 0",
                (owner_id, token),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete descendants: {}", e)))?;

        let itself = conn
            .execute("DELETE FROM nodes WHERE owner_id = ?1 AND id = ?2", (owner_id, id))
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete node: {}", e)))?;

        if itself > 0 {
            if let Some(sibling_path) = sibling_path {
                conn.execute(
                    "UPDATE nodes SET sort_order = sort_order - 1
                     WHERE owner_id = ?1 AND path = ?2 AND sort_order > ?3",
                    (owner_id, sibling_path, order),
                )
                .await
                .map_err(|e| DatabaseError::sql_execution(format!("Failed to close sibling slot: {}", e)))?;
            }
        }

        Ok(descendants + itself)
    }
}
