//! Demo Curriculum Seeder
//!
//! Resets one owner's forest in the configured libsql database, seeds a demo
//! curriculum and prints the resulting tree as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Small demo tree for the default owner
//! cargo run --bin seed-demo
//!
//! # 6 × 6 × 6 × 6 tree for load testing the UI
//! cargo run --bin seed-demo -- --mega --owner alice
//! ```
//!
//! # Environment Variables
//!
//! - `COURSETREE_DB_PATH`: Database file (default: ~/.coursetree/database/coursetree.db)
//! - `COURSETREE_ROOT_VALUE`: Root label (default: "Subjects")
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")
//!
//! **DEVELOPMENT ONLY**: the owner's existing tree is deleted first.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use coursetree_core::db::{DatabaseService, TursoStore};
use coursetree_core::models::Node;
use coursetree_core::{TreeConfig, TreeService};

/// Reset an owner's curriculum and seed demo data
#[derive(Parser)]
#[command(name = "seed-demo", about = "Seed a demo CourseTree curriculum", version)]
struct Args {
    /// Seed the 6 × 6 × 6 × 6 tree instead of the small demo
    #[arg(long)]
    mega: bool,

    /// Owner whose tree is reset and seeded
    #[arg(long, value_name = "ID", default_value = "testUser")]
    owner: String,
}

async fn insert(service: &TreeService, owner: &str, parent: &Node, value: &str) -> Result<Node> {
    service
        .insert_child(owner, &parent.id, value)
        .await?
        .into_node()
        .ok_or_else(|| anyhow!("'{}' does not accept children", parent.value))
}

async fn seed_demo(service: &TreeService, owner: &str, root: &Node) -> Result<()> {
    let subject1 = insert(service, owner, root, "Subject1").await?;
    insert(service, owner, root, "Subject2").await?;

    let lesson1 = insert(service, owner, &subject1, "lesson1").await?;
    insert(service, owner, &subject1, "lesson2").await?;

    let module1 = insert(service, owner, &lesson1, "module1").await?;
    let module2 = insert(service, owner, &lesson1, "module2").await?;

    for workbook in ["workbook1", "workbook2", "workbook3"] {
        insert(service, owner, &module1, workbook).await?;
    }
    insert(service, owner, &module2, "workbook4").await?;

    Ok(())
}

async fn seed_mega(service: &TreeService, owner: &str, root: &Node) -> Result<()> {
    for i in 0..6 {
        let subject = insert(service, owner, root, &format!("Subject {i}")).await?;
        for j in 0..6 {
            let lesson = insert(service, owner, &subject, &format!("Lesson {i}.{j}")).await?;
            for k in 0..6 {
                let module = insert(service, owner, &lesson, &format!("Module {i}.{j}.{k}")).await?;
                for l in 0..6 {
                    insert(service, owner, &module, &format!("Workbook {i}.{j}.{k}.{l}")).await?;
                }
            }
        }
        tracing::info!("Seeded subject {} of 6", i + 1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = TreeConfig::from_env();
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    tracing::info!("📦 Database: {}", config.database_path.display());
    tracing::info!("👤 Owner: {}", args.owner);

    let db = Arc::new(
        DatabaseService::new(config.database_path.clone())
            .await
            .context("Failed to open database")?,
    );
    let service = TreeService::with_config(Arc::new(TursoStore::new(db)), config)?;

    let existing = service.get_or_create_root_tree(&args.owner).await?;
    let removed = service.delete_subtree(&args.owner, &existing.node.id).await?;
    tracing::info!("🧹 Removed {} existing nodes", removed.deleted_count);

    let root = service.get_or_create_root_tree(&args.owner).await?.node;
    if args.mega {
        seed_mega(&service, &args.owner, &root).await?;
    } else {
        seed_demo(&service, &args.owner, &root).await?;
    }

    let tree = service.get_or_create_root_tree(&args.owner).await?;
    tracing::info!("✅ Seeded {} nodes", tree.len());
    println!("{}", serde_json::to_string_pretty(&tree)?);

    Ok(())
}
