//! In-process NodeStore
//!
//! A `HashMap`-backed store used by tests, benchmarks and embedders that do not
//! need persistence. All path matching goes through the token-based codec, and
//! every composite write runs under a single write lock, so relocations and
//! subtree deletions are atomic with respect to other store calls.

use crate::db::node_store::NodeStore;
use crate::models::path::is_descendant_path;
use crate::models::{Node, NodeType, RelocationPlan};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory node store
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<String, Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with existing nodes (ids must be unique)
    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Every stored node, across owners
    pub fn snapshot(&self) -> Result<Vec<Node>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Node>>> {
        self.nodes
            .read()
            .map_err(|_| anyhow!("Failed to acquire node store read lock"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Node>>> {
        self.nodes
            .write()
            .map_err(|_| anyhow!("Failed to acquire node store write lock"))
    }

    fn children_of<'a>(
        nodes: &'a HashMap<String, Node>,
        owner_id: &'a str,
        child_path: &'a str,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        nodes
            .values()
            .filter(move |n| n.owner_id == owner_id && n.path.as_deref() == Some(child_path))
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn create_node(&self, node: Node) -> Result<Node> {
        let mut nodes = self.write()?;

        if nodes.contains_key(&node.id) {
            return Err(anyhow!("Node {} already exists", node.id));
        }
        if node.node_type == NodeType::Root
            && nodes
                .values()
                .any(|n| n.owner_id == node.owner_id && n.node_type == NodeType::Root)
        {
            return Err(anyhow!("Owner {} already has a root node", node.owner_id));
        }

        nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn get_node(&self, owner_id: &str, id: &str) -> Result<Option<Node>> {
        Ok(self
            .read()?
            .get(id)
            .filter(|n| n.owner_id == owner_id)
            .cloned())
    }

    async fn get_root(&self, owner_id: &str) -> Result<Option<Node>> {
        Ok(self
            .read()?
            .values()
            .find(|n| n.owner_id == owner_id && n.node_type == NodeType::Root)
            .cloned())
    }

    async fn get_descendants(&self, owner_id: &str, node: &Node) -> Result<Vec<Node>> {
        let mut descendants: Vec<Node> = self
            .read()?
            .values()
            .filter(|n| n.owner_id == owner_id && is_descendant_path(n.path.as_deref(), &node.id))
            .cloned()
            .collect();
        descendants.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(descendants)
    }

    async fn count_descendants(&self, owner_id: &str, id: &str) -> Result<u64> {
        Ok(self
            .read()?
            .values()
            .filter(|n| n.owner_id == owner_id && is_descendant_path(n.path.as_deref(), id))
            .count() as u64)
    }

    async fn get_children(&self, owner_id: &str, child_path: &str) -> Result<Vec<Node>> {
        let nodes = self.read()?;
        let mut children: Vec<Node> = Self::children_of(&nodes, owner_id, child_path)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(children)
    }

    async fn max_child_order(&self, owner_id: &str, child_path: &str) -> Result<Option<i64>> {
        let nodes = self.read()?;
        Ok(Self::children_of(&nodes, owner_id, child_path)
            .map(|n| n.order)
            .max())
    }

    async fn search_by_value(&self, owner_id: &str, fragment: &str) -> Result<Vec<Node>> {
        let needle = fragment.to_lowercase();
        let mut matches: Vec<Node> = self
            .read()?
            .values()
            .filter(|n| n.owner_id == owner_id && n.value.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.order.cmp(&b.order)));
        Ok(matches)
    }

    async fn relocate_subtree(&self, plan: &RelocationPlan) -> Result<()> {
        let mut nodes = self.write()?;

        if !nodes
            .get(&plan.node_id)
            .is_some_and(|n| n.owner_id == plan.owner_id)
        {
            return Err(anyhow!("Node {} disappeared before relocation", plan.node_id));
        }

        let now = Utc::now();
        for node in nodes.values_mut().filter(|n| n.owner_id == plan.owner_id) {
            if node.id == plan.node_id {
                node.path = Some(plan.new_path.clone());
                node.human_readable_path = plan.new_human_readable_path.clone();
                node.order = plan.new_order;
                node.modified_at = now;
            } else if plan.rewrite_descendant(node)? {
                node.modified_at = now;
            } else if let Some(order) = plan.shifted_sibling_order(node) {
                node.order = order;
                node.modified_at = now;
            }
        }

        Ok(())
    }

    async fn delete_subtree(&self, owner_id: &str, node: &Node) -> Result<u64> {
        let mut nodes = self.write()?;

        let Some(existing) = nodes.get(&node.id).filter(|n| n.owner_id == owner_id).cloned() else {
            return Ok(0);
        };

        let before = nodes.len();
        nodes.retain(|id, n| {
            !(n.owner_id == owner_id
                && (*id == existing.id || is_descendant_path(n.path.as_deref(), &existing.id)))
        });
        let removed = (before - nodes.len()) as u64;

        if let Some(sibling_path) = existing.path.as_deref().filter(|p| !p.is_empty()) {
            for sibling in nodes.values_mut().filter(|n| {
                n.owner_id == owner_id
                    && n.path.as_deref() == Some(sibling_path)
                    && n.order > existing.order
            }) {
                sibling.order -= 1;
            }
        }

        Ok(removed)
    }
}
