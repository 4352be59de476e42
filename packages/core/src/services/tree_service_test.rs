//! Tests for TreeService
//!
//! Tests cover:
//! - Root provisioning and subtree assembly
//! - Child construction along the type ladder
//! - Moves: slot renumbering, descendant rewrite and every rejection path
//! - Idempotent deletion, search overlap, path and count lookups
//! - Domain events

#[cfg(test)]
mod tests {
    use crate::db::{DomainEvent, MemoryStore, NodeStore};
    use crate::models::{ChildInsertion, Node, NodeType, Placement, RelocationPlan, ValidationError};
    use crate::services::{TreeService, TreeServiceError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const OWNER: &str = "owner-1";

    fn create_test_service() -> (TreeService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = TreeService::new(store.clone());
        (service, store)
    }

    async fn insert(service: &TreeService, parent: &Node, value: &str) -> Node {
        service
            .insert_child(&parent.owner_id, &parent.id, value)
            .await
            .unwrap()
            .into_node()
            .expect("parent should accept children")
    }

    async fn reload(service: &TreeService, node: &Node) -> Node {
        service
            .get_node(&node.owner_id, &node.id)
            .await
            .unwrap()
            .expect("node should exist")
    }

    async fn child_orders(service: &TreeService, parent: &Node) -> Vec<(String, i64)> {
        let tree = service
            .get_subtree(&parent.owner_id, &parent.id)
            .await
            .unwrap()
            .unwrap();
        tree.children
            .iter()
            .map(|c| (c.node.value.clone(), c.node.order))
            .collect()
    }

    #[tokio::test]
    async fn test_root_is_provisioned_once() {
        let (service, store) = create_test_service();

        let first = service.get_or_create_root_tree(OWNER).await.unwrap();
        let second = service.get_or_create_root_tree(OWNER).await.unwrap();

        assert_eq!(first.node.id, second.node.id);
        assert_eq!(first.node.node_type, NodeType::Root);
        assert_eq!(first.node.value, "Subjects");
        assert_eq!(first.node.path, None);
        assert_eq!(first.node.human_readable_path, "/");
        assert_eq!(store.snapshot().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_provisioning_creates_one_root() {
        let (service, store) = create_test_service();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.get_or_create_root_tree(OWNER).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.snapshot().unwrap().len(), 1);
    }

    /// Store whose first root lookup misses, as when another process
    /// provisions the root between our read and our insert
    struct StaleRootStore {
        inner: MemoryStore,
        missed: AtomicBool,
    }

    #[async_trait]
    impl NodeStore for StaleRootStore {
        async fn create_node(&self, node: Node) -> anyhow::Result<Node> {
            self.inner.create_node(node).await
        }

        async fn get_node(&self, owner_id: &str, id: &str) -> anyhow::Result<Option<Node>> {
            self.inner.get_node(owner_id, id).await
        }

        async fn get_root(&self, owner_id: &str) -> anyhow::Result<Option<Node>> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get_root(owner_id).await
        }

        async fn get_descendants(&self, owner_id: &str, node: &Node) -> anyhow::Result<Vec<Node>> {
            self.inner.get_descendants(owner_id, node).await
        }

        async fn count_descendants(&self, owner_id: &str, id: &str) -> anyhow::Result<u64> {
            self.inner.count_descendants(owner_id, id).await
        }

        async fn get_children(&self, owner_id: &str, child_path: &str) -> anyhow::Result<Vec<Node>> {
            self.inner.get_children(owner_id, child_path).await
        }

        async fn max_child_order(&self, owner_id: &str, child_path: &str) -> anyhow::Result<Option<i64>> {
            self.inner.max_child_order(owner_id, child_path).await
        }

        async fn search_by_value(&self, owner_id: &str, fragment: &str) -> anyhow::Result<Vec<Node>> {
            self.inner.search_by_value(owner_id, fragment).await
        }

        async fn relocate_subtree(&self, plan: &RelocationPlan) -> anyhow::Result<()> {
            self.inner.relocate_subtree(plan).await
        }

        async fn delete_subtree(&self, owner_id: &str, node: &Node) -> anyhow::Result<u64> {
            self.inner.delete_subtree(owner_id, node).await
        }
    }

    #[tokio::test]
    async fn test_lost_root_race_reuses_existing_root() {
        let existing = Node::new_root(OWNER, "Subjects");
        let store = Arc::new(StaleRootStore {
            inner: MemoryStore::with_nodes([existing.clone()]),
            missed: AtomicBool::new(false),
        });
        let service = TreeService::new(store.clone());

        let tree = service.get_or_create_root_tree(OWNER).await.unwrap();

        assert_eq!(tree.node.id, existing.id);
        assert_eq!(store.inner.snapshot().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_assigns_type_path_and_order() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;

        let math = insert(&service, &root, "Math").await;
        let physics = insert(&service, &root, "Physics").await;
        let algebra = insert(&service, &math, "Algebra").await;

        assert_eq!(math.node_type, NodeType::Subject);
        assert_eq!(math.order, 0);
        assert_eq!(physics.order, 1);
        assert_eq!(math.path, Some(format!(",{},", root.id)));
        assert_eq!(algebra.node_type, NodeType::Lesson);
        assert_eq!(algebra.path, Some(format!(",{},{},", root.id, math.id)));
        assert_eq!(algebra.human_readable_path, "/Subjects/Math/");
        assert_eq!(algebra.order, 0);
    }

    #[tokio::test]
    async fn test_build_child_does_not_persist() {
        let (service, store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;

        let built = service.build_child(OWNER, &root.id, "Math").await.unwrap();
        assert!(built.is_created());
        assert_eq!(store.snapshot().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_workbook_is_not_insertable() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let subject = insert(&service, &root, "Math").await;
        let lesson = insert(&service, &subject, "Algebra").await;
        let module = insert(&service, &lesson, "Groups").await;
        let workbook = insert(&service, &module, "Sheet1").await;
        assert_eq!(workbook.node_type, NodeType::Workbook);

        let result = service
            .insert_child(OWNER, &workbook.id, "Nope")
            .await
            .unwrap();
        assert_eq!(
            result,
            ChildInsertion::NotInsertable {
                parent_id: workbook.id.clone(),
                parent_type: NodeType::Workbook,
            }
        );
        assert_eq!(service.count_descendants(OWNER, &workbook.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_validates_value_and_parent() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;

        let too_short = service.insert_child(OWNER, &root.id, " ab ").await;
        assert!(matches!(
            too_short,
            Err(TreeServiceError::ValidationFailed(ValidationError::InvalidValueLength { .. }))
        ));

        let too_long = service
            .insert_child(OWNER, &root.id, "a value well past twenty")
            .await;
        assert!(too_long.is_err());

        let missing = service.insert_child(OWNER, "missing", "Math").await;
        assert!(matches!(missing, Err(TreeServiceError::NodeNotFound { .. })));

        let trimmed = insert(&service, &root, "  Math  ").await;
        assert_eq!(trimmed.value, "Math");
    }

    #[tokio::test]
    async fn test_append_to_empty_parent_closes_old_slot() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let math = insert(&service, &root, "Math").await;
        let physics = insert(&service, &root, "Physics").await;
        let a = insert(&service, &math, "Lesson A").await;
        let b = insert(&service, &math, "Lesson B").await;
        let c = insert(&service, &math, "Lesson C").await;

        let moved = service
            .change_parent(OWNER, &b.id, &physics.id, Placement::Append)
            .await
            .unwrap();

        assert_eq!(moved.order, 0);
        assert_eq!(moved.path, Some(format!(",{},{},", root.id, physics.id)));
        assert_eq!(moved.human_readable_path, "/Subjects/Physics/");
        assert_eq!(reload(&service, &a).await.order, 0);
        assert_eq!(reload(&service, &c).await.order, 1);
    }

    #[tokio::test]
    async fn test_after_anchor_takes_anchor_slot() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        for value in ["Alpha", "Zeta", "Beta"] {
            insert(&service, &root, value).await;
        }
        let y = insert(&service, &root, "Ypsilon").await;
        let tree = service.get_subtree(OWNER, &root.id).await.unwrap().unwrap();
        let zeta = tree.children[1].node.clone();

        service
            .change_parent(OWNER, &y.id, &root.id, Placement::After(zeta.id.clone()))
            .await
            .unwrap();

        assert_eq!(
            child_orders(&service, &root).await,
            vec![
                ("Alpha".to_string(), 0),
                ("Ypsilon".to_string(), 1),
                ("Zeta".to_string(), 2),
                ("Beta".to_string(), 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_move_within_parent_keeps_orders_contiguous() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let first = insert(&service, &root, "First").await;
        insert(&service, &root, "Second").await;
        insert(&service, &root, "Third").await;

        service
            .change_parent(OWNER, &first.id, &root.id, Placement::Append)
            .await
            .unwrap();

        let orders: Vec<i64> = child_orders(&service, &root)
            .await
            .into_iter()
            .map(|(_, order)| order)
            .collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(reload(&service, &first).await.order, 2);
    }

    #[tokio::test]
    async fn test_move_rewrites_descendants() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let math = insert(&service, &root, "Math").await;
        let physics = insert(&service, &root, "Physics").await;
        let algebra = insert(&service, &math, "Algebra").await;
        let mechanics = insert(&service, &physics, "Mechanics").await;
        let groups = insert(&service, &algebra, "Groups").await;
        let sheet = insert(&service, &groups, "Sheet1").await;

        service
            .change_parent(OWNER, &groups.id, &mechanics.id, Placement::Append)
            .await
            .unwrap();

        let sheet = reload(&service, &sheet).await;
        assert_eq!(
            sheet.path,
            Some(format!(
                ",{},{},{},{},",
                root.id, physics.id, mechanics.id, groups.id
            ))
        );
        assert_eq!(sheet.human_readable_path, "/Subjects/Physics/Mechanics/Groups/");
        assert_eq!(service.count_descendants(OWNER, &algebra.id).await.unwrap(), 0);
        assert_eq!(service.count_descendants(OWNER, &mechanics.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_move_rejections_write_nothing() {
        let (service, store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let math = insert(&service, &root, "Math").await;
        let physics = insert(&service, &root, "Physics").await;
        let algebra = insert(&service, &math, "Algebra").await;
        let groups = insert(&service, &algebra, "Groups").await;
        let mechanics = insert(&service, &physics, "Mechanics").await;

        let mut before = store.snapshot().unwrap();
        before.sort_by(|a, b| a.id.cmp(&b.id));

        let missing_parent = service
            .change_parent(OWNER, &algebra.id, "missing", Placement::Append)
            .await;
        assert!(matches!(missing_parent, Err(TreeServiceError::NodeNotFound { .. })));

        let missing_node = service
            .change_parent(OWNER, "missing", &physics.id, Placement::Append)
            .await;
        assert!(matches!(missing_node, Err(TreeServiceError::NodeNotFound { .. })));

        let root_move = service
            .change_parent(OWNER, &root.id, &math.id, Placement::Append)
            .await;
        assert!(matches!(root_move, Err(TreeServiceError::HierarchyViolation(_))));

        let wrong_level = service
            .change_parent(OWNER, &groups.id, &physics.id, Placement::Append)
            .await;
        assert!(matches!(wrong_level, Err(TreeServiceError::HierarchyViolation(_))));

        let into_self = service
            .change_parent(OWNER, &math.id, &math.id, Placement::Append)
            .await;
        assert!(matches!(into_self, Err(TreeServiceError::CircularReference { .. })));

        let foreign_anchor = service
            .change_parent(OWNER, &algebra.id, &physics.id, Placement::After(math.id.clone()))
            .await;
        assert!(matches!(foreign_anchor, Err(TreeServiceError::InvalidOperation(_))));

        let self_anchor = service
            .change_parent(OWNER, &algebra.id, &physics.id, Placement::After(algebra.id.clone()))
            .await;
        assert!(matches!(self_anchor, Err(TreeServiceError::InvalidOperation(_))));

        let missing_anchor = service
            .change_parent(OWNER, &algebra.id, &physics.id, Placement::After("gone".to_string()))
            .await;
        assert!(matches!(missing_anchor, Err(TreeServiceError::NodeNotFound { .. })));

        let other_owner = service
            .change_parent("owner-2", &algebra.id, &physics.id, Placement::Append)
            .await;
        assert!(matches!(other_owner, Err(TreeServiceError::NodeNotFound { .. })));

        let mut after = store.snapshot().unwrap();
        after.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(before, after);
        assert_eq!(reload(&service, &mechanics).await, mechanics);
    }

    #[tokio::test]
    async fn test_move_into_descendant_is_circular() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let math = insert(&service, &root, "Math").await;
        let algebra = insert(&service, &math, "Algebra").await;
        let groups = insert(&service, &algebra, "Groups").await;

        let result = service
            .change_parent(OWNER, &algebra.id, &groups.id, Placement::Append)
            .await;
        assert!(matches!(result, Err(TreeServiceError::CircularReference { .. })));
        assert_eq!(reload(&service, &algebra).await, algebra);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_renumbers() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let math = insert(&service, &root, "Math").await;
        let physics = insert(&service, &root, "Physics").await;
        insert(&service, &math, "Algebra").await;

        let result = service.delete_subtree(OWNER, &math.id).await.unwrap();
        assert!(result.existed);
        assert_eq!(result.deleted_count, 2);
        assert_eq!(reload(&service, &physics).await.order, 0);

        let again = service.delete_subtree(OWNER, &math.id).await.unwrap();
        assert!(!again.existed);
        assert_eq!(again.deleted_count, 0);
    }

    #[tokio::test]
    async fn test_search_returns_overlapping_subtrees() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let subject = insert(&service, &root, "Math").await;
        let lesson = insert(&service, &subject, "Lesson1").await;
        let module = insert(&service, &lesson, "ModuleLessLess").await;

        let trees = service.search(OWNER, "less").await.unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].node.id, lesson.id);
        assert!(trees[0].find(&module.id).is_some());
        assert_eq!(trees[1].node.id, module.id);

        assert!(service.search(OWNER, "   ").await.unwrap().is_empty());
        assert!(service.search(OWNER, "zzzz").await.unwrap().is_empty());
        assert!(service.search("owner-2", "less").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_and_count_lookups() {
        let (service, _store) = create_test_service();
        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let math = insert(&service, &root, "Math").await;
        let algebra = insert(&service, &math, "Algebra").await;

        assert_eq!(
            service.get_human_readable_path(OWNER, &algebra.id).await.unwrap(),
            Some("/Subjects/Math/".to_string())
        );
        assert_eq!(service.get_human_readable_path(OWNER, "missing").await.unwrap(), None);
        assert_eq!(service.count_descendants(OWNER, &root.id).await.unwrap(), 2);
        assert_eq!(service.count_descendants(OWNER, "missing").await.unwrap(), 0);
        assert_eq!(service.count_descendants(OWNER, "a,b").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mutations_emit_events() {
        let (service, _store) = create_test_service();
        let mut events = service.subscribe_to_events();

        let root = service.get_or_create_root_tree(OWNER).await.unwrap().node;
        let math = insert(&service, &root, "Math").await;
        let physics = insert(&service, &root, "Physics").await;
        let algebra = insert(&service, &math, "Algebra").await;
        service
            .change_parent(OWNER, &algebra.id, &physics.id, Placement::Append)
            .await
            .unwrap();
        service.delete_subtree(OWNER, &physics.id).await.unwrap();

        let mut types = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.owner_id(), OWNER);
            if let DomainEvent::SubtreeDeleted { deleted_count, .. } = &event {
                assert_eq!(*deleted_count, 2);
            }
            types.push(event.event_type());
        }
        assert_eq!(
            types,
            vec![
                "node_created",
                "node_created",
                "node_created",
                "node_created",
                "node_moved",
                "subtree_deleted",
            ]
        );
    }
}
