//! Reparent Planning
//!
//! A move is computed up front as a [`RelocationPlan`] and then handed to the
//! store, which applies every write of the plan as one unit:
//!
//! 1. Rewrite the paths of every descendant of the moved node (prefix swap)
//! 2. Close the moved node's old slot: former siblings after it shift −1
//! 3. Open the new slot: new siblings at or after `new_order` shift +1
//! 4. Write the moved node's own path, human-readable path and order
//!
//! Steps 2 and 3 run in that order even when old and new parent coincide, so
//! the planned `new_order` is expressed in post-step-2 numbering.
//!
//! # Placement
//!
//! `After(anchor)` gives the moved node the anchor's slot and shifts the anchor
//! (and everything after it) by one, so on ties the moved node lands directly
//! before the anchor. `Append` places it after the last child.

use crate::models::path::{is_descendant_path, rebase_human_readable_path, MaterializedPath};
use crate::models::{Node, ValidationError};
use thiserror::Error;

/// Where a moved node lands among its new siblings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// After the current last child
    Append,

    /// Into the slot of this sibling
    After(String),
}

impl Placement {
    /// Interpret the wire form, where an empty id means "dropped on the parent"
    pub fn from_after_node_id(after_node_id: &str) -> Self {
        let trimmed = after_node_id.trim();
        if trimmed.is_empty() {
            Placement::Append
        } else {
            Placement::After(trimmed.to_string())
        }
    }
}

/// Placement anchor problems
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("Anchor node {anchor_id} is not a child of {parent_id}")]
    AnchorNotSibling { anchor_id: String, parent_id: String },

    #[error("Node {0} cannot be placed after itself")]
    AnchorIsMovingNode(String),
}

/// Order the moving node will take among `new_siblings`
///
/// `new_siblings` are the current direct children of the new parent (the
/// moving node may be among them when it stays under the same parent).
pub fn plan_order(
    node: &Node,
    new_parent_id: &str,
    same_parent: bool,
    new_siblings: &[Node],
    placement: &Placement,
) -> Result<i64, PlacementError> {
    let effective_order = |sibling: &Node| {
        if same_parent && sibling.order > node.order {
            sibling.order - 1
        } else {
            sibling.order
        }
    };

    match placement {
        Placement::Append => Ok(new_siblings
            .iter()
            .filter(|s| s.id != node.id)
            .map(effective_order)
            .max()
            .map_or(0, |max| max + 1)),
        Placement::After(anchor_id) => {
            if *anchor_id == node.id {
                return Err(PlacementError::AnchorIsMovingNode(node.id.clone()));
            }
            new_siblings
                .iter()
                .find(|s| s.id == *anchor_id)
                .map(effective_order)
                .ok_or_else(|| PlacementError::AnchorNotSibling {
                    anchor_id: anchor_id.clone(),
                    parent_id: new_parent_id.to_string(),
                })
        }
    }
}

/// Every write needed to move one node (and its subtree) under a new parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationPlan {
    pub owner_id: String,
    pub node_id: String,
    pub old_path: String,
    pub new_path: String,
    pub old_human_readable_path: String,
    pub new_human_readable_path: String,
    pub old_order: i64,
    pub new_order: i64,
}

impl RelocationPlan {
    /// Plan moving `node` under `new_parent` at `new_order`
    pub fn new(node: &Node, new_parent: &Node, new_order: i64) -> Result<Self, ValidationError> {
        let old_path = node
            .path
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ValidationError::InvalidPath(format!("root node {} has no parent", node.id)))?;
        let new_path = new_parent
            .child_path()?
            .encode()
            .ok_or_else(|| ValidationError::InvalidPath(new_parent.id.clone()))?;

        Ok(Self {
            owner_id: node.owner_id.clone(),
            node_id: node.id.clone(),
            old_path,
            new_path,
            old_human_readable_path: node.human_readable_path.clone(),
            new_human_readable_path: new_parent.child_human_readable_path(),
            old_order: node.order,
            new_order,
        })
    }

    /// Rewrite a descendant's paths in place; `false` when `node` is not a descendant
    pub fn rewrite_descendant(&self, node: &mut Node) -> Result<bool, ValidationError> {
        if !is_descendant_path(node.path.as_deref(), &self.node_id) {
            return Ok(false);
        }

        let old_prefix = MaterializedPath::parse(Some(&self.old_path))?;
        let new_prefix = MaterializedPath::parse(Some(&self.new_path))?;
        if let Some(rebased) = node.materialized_path()?.rebase(&old_prefix, &new_prefix) {
            node.path = rebased.encode();
        }
        if let Some(rebased) = rebase_human_readable_path(
            &node.human_readable_path,
            &self.old_human_readable_path,
            &self.new_human_readable_path,
        ) {
            node.human_readable_path = rebased;
        }
        Ok(true)
    }

    /// Order a sibling ends up with after the slot close/open steps
    ///
    /// Returns `None` for nodes the plan does not renumber.
    pub fn shifted_sibling_order(&self, node: &Node) -> Option<i64> {
        if node.id == self.node_id || node.owner_id != self.owner_id {
            return None;
        }

        let path = node.path.as_deref()?;
        let mut order = node.order;
        if path == self.old_path && order > self.old_order {
            order -= 1;
        }
        if path == self.new_path && order >= self.new_order {
            order += 1;
        }
        (order != node.order).then_some(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn children(parent: &Node, names: &[&str]) -> Vec<Node> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Node::new_child(parent, *name, i as i64).unwrap())
            .collect()
    }

    #[test]
    fn test_placement_sentinel() {
        assert_eq!(Placement::from_after_node_id(""), Placement::Append);
        assert_eq!(Placement::from_after_node_id("  "), Placement::Append);
        assert_eq!(
            Placement::from_after_node_id("abc"),
            Placement::After("abc".to_string())
        );
    }

    #[test]
    fn test_append_to_empty_parent_is_zero() {
        let root = Node::new_root("o", "Subjects");
        let subjects = children(&root, &["Alpha", "Beta"]);
        let lesson = Node::new_child(&subjects[0], "Less", 0).unwrap();

        let order = plan_order(&lesson, &subjects[1].id, false, &[], &Placement::Append).unwrap();
        assert_eq!(order, 0);
    }

    #[test]
    fn test_append_within_same_parent_accounts_for_closed_slot() {
        let root = Node::new_root("o", "Subjects");
        let subjects = children(&root, &["A", "B", "C"]);

        let order =
            plan_order(&subjects[0], &root.id, true, &subjects, &Placement::Append).unwrap();
        assert_eq!(order, 2);
    }

    #[test]
    fn test_after_anchor_takes_anchor_slot() {
        let root = Node::new_root("o", "Subjects");
        let subjects = children(&root, &["A", "Z", "B", "Y"]);

        // Moving up: Y takes Z's slot
        let order = plan_order(
            &subjects[3],
            &root.id,
            true,
            &subjects,
            &Placement::After(subjects[1].id.clone()),
        )
        .unwrap();
        assert_eq!(order, 1);

        // Moving down: A's slot closes first, so Z's slot is 0
        let order = plan_order(
            &subjects[0],
            &root.id,
            true,
            &subjects,
            &Placement::After(subjects[1].id.clone()),
        )
        .unwrap();
        assert_eq!(order, 0);
    }

    #[test]
    fn test_anchor_must_be_sibling_and_not_self() {
        let root = Node::new_root("o", "Subjects");
        let subjects = children(&root, &["A", "B"]);

        assert_eq!(
            plan_order(
                &subjects[0],
                &root.id,
                true,
                &subjects,
                &Placement::After(subjects[0].id.clone())
            ),
            Err(PlacementError::AnchorIsMovingNode(subjects[0].id.clone()))
        );
        assert!(matches!(
            plan_order(
                &subjects[0],
                &root.id,
                true,
                &subjects,
                &Placement::After("elsewhere".to_string())
            ),
            Err(PlacementError::AnchorNotSibling { .. })
        ));
    }

    #[test]
    fn test_plan_rejects_root() {
        let root = Node::new_root("o", "Subjects");
        let other = Node::new_root("o", "Other");
        assert!(RelocationPlan::new(&root, &other, 0).is_err());
    }

    #[test]
    fn test_rewrite_descendant_swaps_prefixes() {
        let root = Node::new_root("o", "Subjects");
        let subjects = children(&root, &["Math", "Physics"]);
        let lesson = Node::new_child(&subjects[0], "Algebra", 0).unwrap();
        let module = Node::new_child(&lesson, "Groups", 0).unwrap();
        let target_lesson = Node::new_child(&subjects[1], "Mechanics", 0).unwrap();

        // Move module under the Physics lesson
        let plan = RelocationPlan::new(&module, &target_lesson, 0).unwrap();
        let mut workbook = Node::new_child(&module, "Sheet1", 0).unwrap();
        assert!(plan.rewrite_descendant(&mut workbook).unwrap());
        assert_eq!(
            workbook.path,
            Some(format!(
                ",{},{},{},{},",
                root.id, subjects[1].id, target_lesson.id, module.id
            ))
        );
        assert_eq!(
            workbook.human_readable_path,
            "/Subjects/Physics/Mechanics/Groups/"
        );

        let mut unrelated = lesson.clone();
        assert!(!plan.rewrite_descendant(&mut unrelated).unwrap());
        assert_eq!(unrelated, lesson);
    }

    #[test]
    fn test_shifted_sibling_order_same_parent() {
        let root = Node::new_root("o", "Subjects");
        let s = children(&root, &["A", "Y", "C", "Z", "B"]);

        // Y(1) after Z(3): close gives C1 Z2 B3, Z's slot is 2, open shifts Z3 B4
        let new_order = plan_order(&s[1], &root.id, true, &s, &Placement::After(s[3].id.clone()))
            .unwrap();
        assert_eq!(new_order, 2);
        let plan = RelocationPlan::new(&s[1], &root, new_order).unwrap();

        let shifted: Vec<Option<i64>> = s.iter().map(|n| plan.shifted_sibling_order(n)).collect();
        assert_eq!(shifted, vec![None, None, Some(1), None, None]);
    }
}
