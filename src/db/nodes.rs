//! Node storage: identity, hierarchy and cascade deletion

use super::{now, GraphDb};
use crate::attrs::{AttrFilter, Attrs};
use crate::error::{Error, Result};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, info};
use uuid::Uuid;

/// Recursive CTE selecting a node and every transitive descendant as `subtree(id)`
macro_rules! subtree_cte {
    () => {
        "WITH RECURSIVE subtree(id) AS (
            SELECT id FROM nodes WHERE id = ?1
            UNION ALL
            SELECT n.id FROM nodes n JOIN subtree s ON n.parent_id = s.id
        ) "
    };
}

/// A typed entity in the content graph
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub node_type: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub slug: Option<String>,
    /// Weak reference to the chunk this node belongs to
    pub chunk_id: Option<String>,
    #[sqlx(json)]
    pub attrs: Attrs,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a node about to be created
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewNode {
    pub node_type: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub attrs: Attrs,
}

impl NewNode {
    pub fn new(node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_chunk(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }
}

/// Partial update of a node's mutable fields.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePatch {
    pub name: Option<String>,
    pub slug: Option<Option<String>>,
    pub attrs: Option<Attrs>,
    pub parent_id: Option<Option<String>>,
    pub chunk_id: Option<Option<String>>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.slug.is_none()
            && self.attrs.is_none()
            && self.parent_id.is_none()
            && self.chunk_id.is_none()
    }
}

/// Counts of rows removed by a cascading node delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteStats {
    pub nodes: u64,
    pub links: u64,
    pub chunks: u64,
}

/// Node listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeQuery {
    pub node_type: Option<String>,
    pub chunk_id: Option<String>,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub attrs: AttrFilter,
    pub limit: Option<usize>,
}

/// Verify that placing `node_id` under `parent_id` keeps the hierarchy a forest.
///
/// Walks the ancestor chain of the proposed parent up to the root, at most
/// `max_depth` steps. Must run on the connection that will apply the change.
pub(crate) async fn ensure_acyclic(
    conn: &mut SqliteConnection,
    node_id: &str,
    parent_id: &str,
    max_depth: usize,
) -> Result<()> {
    if node_id == parent_id {
        return Err(Error::CycleDetected {
            node_id: node_id.to_string(),
            parent_id: parent_id.to_string(),
        });
    }

    let chain: Vec<(String, Option<String>, i64)> = sqlx::query_as(
        r#"
        WITH RECURSIVE ancestors(id, parent_id, depth) AS (
            SELECT id, parent_id, 1 FROM nodes WHERE id = ?1
            UNION ALL
            SELECT n.id, n.parent_id, a.depth + 1
            FROM nodes n JOIN ancestors a ON n.id = a.parent_id
            WHERE a.depth < ?2
        )
        SELECT id, parent_id, depth FROM ancestors ORDER BY depth
        "#,
    )
    .bind(parent_id)
    .bind(max_depth as i64)
    .fetch_all(&mut *conn)
    .await?;

    if chain.is_empty() {
        return Err(Error::InvalidParent(parent_id.to_string()));
    }

    if chain.iter().any(|(id, _, _)| id == node_id) {
        return Err(Error::CycleDetected {
            node_id: node_id.to_string(),
            parent_id: parent_id.to_string(),
        });
    }

    if let Some((_, Some(_), depth)) = chain.last() {
        if *depth as usize >= max_depth {
            return Err(Error::MaxDepthExceeded(max_depth));
        }
    }

    Ok(())
}

impl GraphDb {
    // ===== Node Operations =====

    /// Create a node; its parent, if any, must already exist
    pub async fn create_node(&self, new: NewNode) -> Result<Node> {
        let now = now();
        let node = Node {
            id: Uuid::new_v4().to_string(),
            node_type: new.node_type,
            name: new.name,
            parent_id: new.parent_id,
            slug: new.slug,
            chunk_id: new.chunk_id,
            attrs: new.attrs,
            created_at: now.clone(),
            updated_at: now,
        };

        // Parent check and insert happen in one statement
        let result = sqlx::query(
            r#"
            INSERT INTO nodes (id, node_type, name, parent_id, slug, chunk_id, attrs, created_at, updated_at)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8
            WHERE ?4 IS NULL OR EXISTS (SELECT 1 FROM nodes WHERE id = ?4)
            "#,
        )
        .bind(&node.id)
        .bind(&node.node_type)
        .bind(&node.name)
        .bind(&node.parent_id)
        .bind(&node.slug)
        .bind(&node.chunk_id)
        .bind(Json(&node.attrs))
        .bind(&node.created_at)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::InvalidParent(
                node.parent_id.clone().unwrap_or_default(),
            ));
        }

        debug!("Created {} node {}", node.node_type, node.id);
        Ok(node)
    }

    /// Get node by ID
    pub async fn get_node(&self, id: &str) -> Result<Node> {
        sqlx::query_as::<_, Node>("SELECT * FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| Error::not_found("node", id))
    }

    /// Apply a partial update. A parent change re-validates the forest invariant.
    pub async fn update_node(&self, id: &str, patch: NodePatch) -> Result<Node> {
        let now = now();
        let mut tx = self.pool().begin().await?;

        // Touch the row first: takes the write lock and proves existence
        let touched = sqlx::query("UPDATE nodes SET updated_at = ?1 WHERE id = ?2")
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(Error::not_found("node", id));
        }

        let mut node: Node = sqlx::query_as("SELECT * FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(parent_id) = patch.parent_id {
            if parent_id != node.parent_id {
                if let Some(parent) = &parent_id {
                    ensure_acyclic(&mut *tx, id, parent, self.max_depth()).await?;
                }
                node.parent_id = parent_id;
            }
        }
        if let Some(name) = patch.name {
            node.name = name;
        }
        if let Some(slug) = patch.slug {
            node.slug = slug;
        }
        if let Some(chunk_id) = patch.chunk_id {
            node.chunk_id = chunk_id;
        }
        if let Some(attrs) = patch.attrs {
            node.attrs = attrs;
        }
        node.updated_at = now;

        sqlx::query(
            r#"
            UPDATE nodes SET
                name = ?1,
                parent_id = ?2,
                slug = ?3,
                chunk_id = ?4,
                attrs = ?5,
                updated_at = ?6
            WHERE id = ?7
            "#,
        )
        .bind(&node.name)
        .bind(&node.parent_id)
        .bind(&node.slug)
        .bind(&node.chunk_id)
        .bind(Json(&node.attrs))
        .bind(&node.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Updated node {}", id);
        Ok(node)
    }

    /// Delete a node, its whole subtree, every link touching the subtree and
    /// every chunk scoped to it, as one transaction.
    pub async fn delete_node(&self, id: &str) -> Result<DeleteStats> {
        let mut tx = self.pool().begin().await?;

        let links = sqlx::query(concat!(
            subtree_cte!(),
            "DELETE FROM links
             WHERE src_id IN (SELECT id FROM subtree) OR dst_id IN (SELECT id FROM subtree)"
        ))
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Rows removed through ON DELETE CASCADE are not reported by rows_affected
        let nodes: i64 = sqlx::query_scalar(concat!(subtree_cte!(), "SELECT COUNT(*) FROM subtree"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if nodes == 0 {
            return Err(Error::not_found("node", id));
        }

        let chunks = sqlx::query(concat!(
            subtree_cte!(),
            "DELETE FROM chunks WHERE scope_node_id IN (SELECT id FROM subtree)"
        ))
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(concat!(
            subtree_cte!(),
            "DELETE FROM nodes WHERE id IN (SELECT id FROM subtree)"
        ))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let stats = DeleteStats {
            nodes: nodes as u64,
            links,
            chunks,
        };
        info!(
            "Deleted node {} ({} nodes, {} links, {} chunks)",
            id, stats.nodes, stats.links, stats.chunks
        );
        Ok(stats)
    }

    /// Stream the direct children of a node, oldest first.
    ///
    /// The stream is lazy; calling this again starts a fresh scan.
    pub fn list_children<'a>(&'a self, parent_id: &str) -> BoxStream<'a, Result<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT * FROM nodes WHERE parent_id = ? ORDER BY created_at, rowid",
        )
        .bind(parent_id.to_string())
        .fetch(self.pool())
        .map(|row| row.map_err(Error::from))
        .boxed()
    }

    /// Collect the direct children of a node
    pub async fn children(&self, parent_id: &str) -> Result<Vec<Node>> {
        self.list_children(parent_id).try_collect().await
    }

    /// Parent chain of a node, nearest first, ending at its root.
    ///
    /// Fails with `MaxDepthExceeded` when the root lies more than
    /// `graph.max_depth` levels up.
    pub async fn ancestors(&self, id: &str) -> Result<Vec<Node>> {
        let node = self.get_node(id).await?;
        let Some(parent_id) = node.parent_id else {
            return Ok(Vec::new());
        };

        let ancestors = sqlx::query_as::<_, Node>(
            r#"
            WITH RECURSIVE chain(id, parent_id, depth) AS (
                SELECT id, parent_id, 1 FROM nodes WHERE id = ?1
                UNION ALL
                SELECT n.id, n.parent_id, c.depth + 1
                FROM nodes n JOIN chain c ON n.id = c.parent_id
                WHERE c.depth < ?2
            )
            SELECT nodes.* FROM chain JOIN nodes ON nodes.id = chain.id
            ORDER BY chain.depth
            "#,
        )
        .bind(parent_id)
        .bind(self.max_depth() as i64)
        .fetch_all(self.pool())
        .await?;

        // The walk stopped before reaching a root
        if ancestors.last().is_some_and(|last| last.parent_id.is_some()) {
            return Err(Error::MaxDepthExceeded(self.max_depth()));
        }

        Ok(ancestors)
    }

    /// Find nodes by type, chunk, parent and attribute predicates
    pub async fn find_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM nodes WHERE 1 = 1");
        if let Some(node_type) = &query.node_type {
            builder.push(" AND node_type = ").push_bind(node_type);
        }
        if let Some(chunk_id) = &query.chunk_id {
            builder.push(" AND chunk_id = ").push_bind(chunk_id);
        }
        if let Some(parent_id) = &query.parent_id {
            builder.push(" AND parent_id = ").push_bind(parent_id);
        }
        builder.push(" ORDER BY created_at, rowid");
        // Attribute predicates run in Rust, so only limit in SQL without them
        if let (Some(limit), true) = (query.limit, query.attrs.is_empty()) {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let nodes = builder.build_query_as::<Node>().fetch_all(self.pool()).await?;

        Ok(nodes
            .into_iter()
            .filter(|node| query.attrs.matches(&node.attrs))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::super::{NewChunk, NewLink};
    use super::*;
    use serde_json::json;

    fn attrs(value: serde_json::Value) -> Attrs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_node_crud() {
        let (db, _tmp) = setup_test_db().await;

        let root = db
            .create_node(
                NewNode::new("country", "Brassmark")
                    .with_slug("brassmark")
                    .with_attrs(attrs(json!({ "era": "steam" }))),
            )
            .await
            .unwrap();
        assert_eq!(root.created_at, root.updated_at);

        let loaded = db.get_node(&root.id).await.unwrap();
        assert_eq!(loaded, root);

        let patch = NodePatch {
            name: Some("Brassmark Union".to_string()),
            slug: Some(None),
            ..Default::default()
        };
        let updated = db.update_node(&root.id, patch).await.unwrap();
        assert_eq!(updated.name, "Brassmark Union");
        assert_eq!(updated.slug, None);
        assert_eq!(updated.attrs, attrs(json!({ "era": "steam" })));
        assert_eq!(updated.created_at, root.created_at);
        assert!(updated.updated_at >= root.updated_at);

        assert_eq!(db.get_node(&root.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_missing_parent_is_rejected() {
        let (db, _tmp) = setup_test_db().await;

        let err = db
            .create_node(NewNode::new("city", "Nowhere").with_parent("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParent(id) if id == "missing"));
        assert_eq!(db.global_stats().await.unwrap().node_count, 0);
    }

    #[tokio::test]
    async fn test_get_and_update_missing_node() {
        let (db, _tmp) = setup_test_db().await;

        assert!(matches!(
            db.get_node("ghost").await,
            Err(Error::NotFound { entity: "node", .. })
        ));
        assert!(matches!(
            db.update_node("ghost", NodePatch::default()).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            db.delete_node("ghost").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_reparent_rejects_cycles() {
        let (db, _tmp) = setup_test_db().await;

        let a = db.create_node(NewNode::new("region", "A")).await.unwrap();
        let b = db
            .create_node(NewNode::new("region", "B").with_parent(&a.id))
            .await
            .unwrap();
        let c = db
            .create_node(NewNode::new("region", "C").with_parent(&b.id))
            .await
            .unwrap();

        // Self-reference
        let err = db
            .update_node(
                &a.id,
                NodePatch {
                    parent_id: Some(Some(a.id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));

        // Moving A under its grandchild
        let err = db
            .update_node(
                &a.id,
                NodePatch {
                    parent_id: Some(Some(c.id.clone())),
                    name: Some("renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));

        // Rejected update leaves the node untouched
        let unchanged = db.get_node(&a.id).await.unwrap();
        assert_eq!(unchanged.parent_id, None);
        assert_eq!(unchanged.name, "A");

        // Moving C to the root and then under A is fine
        let moved = db
            .update_node(
                &c.id,
                NodePatch {
                    parent_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.parent_id, None);

        let moved = db
            .update_node(
                &c.id,
                NodePatch {
                    parent_id: Some(Some(a.id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.parent_id.as_deref(), Some(a.id.as_str()));
    }

    #[tokio::test]
    async fn test_reparent_to_missing_node() {
        let (db, _tmp) = setup_test_db().await;

        let a = db.create_node(NewNode::new("region", "A")).await.unwrap();
        let err = db
            .update_node(
                &a.id,
                NodePatch {
                    parent_id: Some(Some("missing".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParent(_)));
    }

    #[tokio::test]
    async fn test_ancestor_walk_is_bounded() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = crate::config::Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        config.graph.max_depth = 3;
        let db = GraphDb::open(&config).await.unwrap();

        let mut parent = db.create_node(NewNode::new("level", "0")).await.unwrap();
        for depth in 1..5 {
            parent = db
                .create_node(NewNode::new("level", depth.to_string()).with_parent(&parent.id))
                .await
                .unwrap();
        }
        let loose = db.create_node(NewNode::new("level", "loose")).await.unwrap();

        let err = db
            .update_node(
                &loose.id,
                NodePatch {
                    parent_id: Some(Some(parent.id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MaxDepthExceeded(3)));
    }

    #[tokio::test]
    async fn test_ancestors_beyond_max_depth_fail() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = crate::config::Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        config.graph.max_depth = 3;
        let db = GraphDb::open(&config).await.unwrap();

        let mut chain = vec![db.create_node(NewNode::new("level", "0")).await.unwrap()];
        for depth in 1..=5 {
            let parent_id = chain[depth - 1].id.clone();
            chain.push(
                db.create_node(NewNode::new("level", depth.to_string()).with_parent(parent_id))
                    .await
                    .unwrap(),
            );
        }

        assert!(matches!(
            db.ancestors(&chain[5].id).await,
            Err(Error::MaxDepthExceeded(3))
        ));

        // Exactly max_depth ancestors still reaches the root
        let names: Vec<String> = db
            .ancestors(&chain[3].id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["2", "1", "0"]);
    }

    #[tokio::test]
    async fn test_delete_reports_whole_subtree() {
        let (db, _tmp) = setup_test_db().await;

        let a = db.create_node(NewNode::new("country", "A")).await.unwrap();
        let b = db
            .create_node(NewNode::new("city", "B").with_parent(&a.id))
            .await
            .unwrap();
        let c = db
            .create_node(NewNode::new("district", "C").with_parent(&b.id))
            .await
            .unwrap();

        let stats = db.delete_node(&a.id).await.unwrap();
        assert_eq!(stats.nodes, 3);
        assert!(matches!(db.get_node(&c.id).await, Err(Error::NotFound { .. })));
        assert!(matches!(
            db.delete_node(&a.id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_subtree_links_and_chunks() {
        let (db, _tmp) = setup_test_db().await;

        let a = db.create_node(NewNode::new("country", "A")).await.unwrap();
        let b = db
            .create_node(NewNode::new("city", "B").with_parent(&a.id))
            .await
            .unwrap();
        let c = db
            .create_node(NewNode::new("district", "C").with_parent(&b.id))
            .await
            .unwrap();
        let other = db.create_node(NewNode::new("country", "Other")).await.unwrap();

        db.create_link(NewLink::new(&other.id, &c.id, "trades_with"))
            .await
            .unwrap();
        db.create_link(NewLink::new(&b.id, &a.id, "capital_of"))
            .await
            .unwrap();
        let kept = db
            .create_link(NewLink::new(&other.id, &other.id, "self_note"))
            .await
            .unwrap();
        db.create_chunk(NewChunk::new("city:b", "city", &b.id))
            .await
            .unwrap();

        let stats = db.delete_node(&a.id).await.unwrap();
        assert_eq!(
            stats,
            DeleteStats {
                nodes: 3,
                links: 2,
                chunks: 1
            }
        );

        for id in [&a.id, &b.id, &c.id] {
            assert!(matches!(db.get_node(id).await, Err(Error::NotFound { .. })));
        }
        assert!(matches!(
            db.get_chunk("city:b").await,
            Err(Error::NotFound { .. })
        ));
        assert!(db.get_link(&kept.id).await.is_ok());
        assert!(db.get_node(&other.id).await.is_ok());
        assert_eq!(db.list_outbound(&other.id, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_children_are_ordered_and_restartable() {
        let (db, _tmp) = setup_test_db().await;

        let root = db.create_node(NewNode::new("country", "Root")).await.unwrap();
        let mut expected = Vec::new();
        for name in ["first", "second", "third"] {
            let child = db
                .create_node(NewNode::new("city", name).with_parent(&root.id))
                .await
                .unwrap();
            expected.push(child.id);
        }

        let mut stream = db.list_children(&root.id);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.name, "first");
        drop(stream);

        let all: Vec<String> = db
            .children(&root.id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(all, expected);
        assert!(db.children(&expected[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ancestors_reach_root() {
        let (db, _tmp) = setup_test_db().await;

        let a = db.create_node(NewNode::new("country", "A")).await.unwrap();
        let b = db
            .create_node(NewNode::new("city", "B").with_parent(&a.id))
            .await
            .unwrap();
        let c = db
            .create_node(NewNode::new("district", "C").with_parent(&b.id))
            .await
            .unwrap();

        let chain: Vec<String> = db
            .ancestors(&c.id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(chain, vec!["B", "A"]);
        assert!(db.ancestors(&a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_nodes_by_type_and_attrs() {
        let (db, _tmp) = setup_test_db().await;

        db.create_node(
            NewNode::new("npc", "Ada")
                .with_chunk("city:1")
                .with_attrs(attrs(json!({ "profession": "engineer", "age": 31 }))),
        )
        .await
        .unwrap();
        db.create_node(
            NewNode::new("npc", "Brom")
                .with_chunk("city:1")
                .with_attrs(attrs(json!({ "profession": "smith" }))),
        )
        .await
        .unwrap();
        db.create_node(NewNode::new("building", "Foundry").with_chunk("city:1"))
            .await
            .unwrap();

        let npcs = db
            .find_nodes(&NodeQuery {
                node_type: Some("npc".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(npcs.len(), 2);

        let engineers = db
            .find_nodes(&NodeQuery {
                attrs: AttrFilter {
                    contains: Some(attrs(json!({ "profession": "engineer" }))),
                    has_keys: vec![],
                },
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(engineers.len(), 1);
        assert_eq!(engineers[0].name, "Ada");

        let with_age = db
            .find_nodes(&NodeQuery {
                chunk_id: Some("city:1".to_string()),
                attrs: AttrFilter {
                    contains: None,
                    has_keys: vec!["age".to_string()],
                },
                limit: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(with_age.len(), 1);

        let limited = db
            .find_nodes(&NodeQuery {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }
}
