//! Bulk insert-or-update of caller-identified nodes and links

use super::nodes::ensure_acyclic;
use super::{now, GraphDb};
use crate::attrs::Attrs;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use tracing::info;

/// A node with a caller-assigned id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
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

/// A link with a caller-assigned id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: String,
    pub src_id: String,
    pub dst_id: String,
    pub link_type: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub attrs: Attrs,
}

/// A batch of records applied in one transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkUpsert {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

impl BulkUpsert {
    pub fn len(&self) -> usize {
        self.nodes.len() + self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

/// Rows written by a bulk upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertStats {
    pub nodes: usize,
    pub links: usize,
}

impl GraphDb {
    /// Insert or update every record of `batch` atomically.
    ///
    /// Foreign keys are deferred to commit, so records may reference nodes
    /// that appear later in the same batch. Before committing, each upserted
    /// node's parent chain and each upserted link's endpoints are verified.
    pub async fn bulk_upsert(&self, batch: &BulkUpsert) -> Result<UpsertStats> {
        for node in &batch.nodes {
            if node.parent_id.as_deref() == Some(node.id.as_str()) {
                return Err(Error::CycleDetected {
                    node_id: node.id.clone(),
                    parent_id: node.id.clone(),
                });
            }
        }

        let now = now();
        let mut tx = self.pool().begin().await?;

        sqlx::query("PRAGMA defer_foreign_keys = ON")
            .execute(&mut *tx)
            .await?;

        for node in &batch.nodes {
            sqlx::query(
                r#"
                INSERT INTO nodes (id, node_type, name, parent_id, slug, chunk_id, attrs, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    node_type = excluded.node_type,
                    name = excluded.name,
                    parent_id = excluded.parent_id,
                    slug = excluded.slug,
                    chunk_id = excluded.chunk_id,
                    attrs = excluded.attrs,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&node.id)
            .bind(&node.node_type)
            .bind(&node.name)
            .bind(&node.parent_id)
            .bind(&node.slug)
            .bind(&node.chunk_id)
            .bind(Json(&node.attrs))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        for link in &batch.links {
            sqlx::query(
                r#"
                INSERT INTO links (id, src_id, dst_id, link_type, weight, attrs, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    src_id = excluded.src_id,
                    dst_id = excluded.dst_id,
                    link_type = excluded.link_type,
                    weight = excluded.weight,
                    attrs = excluded.attrs
                "#,
            )
            .bind(&link.id)
            .bind(&link.src_id)
            .bind(&link.dst_id)
            .bind(&link.link_type)
            .bind(link.weight)
            .bind(Json(&link.attrs))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        for node in &batch.nodes {
            if let Some(parent_id) = &node.parent_id {
                ensure_acyclic(&mut *tx, &node.id, parent_id, self.max_depth()).await?;
            }
        }

        for link in &batch.links {
            for endpoint in [&link.src_id, &link.dst_id] {
                let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM nodes WHERE id = ?")
                    .bind(endpoint)
                    .fetch_optional(&mut *tx)
                    .await?;
                if exists.is_none() {
                    return Err(Error::InvalidEndpoint(endpoint.clone()));
                }
            }
        }

        tx.commit().await?;

        let stats = UpsertStats {
            nodes: batch.nodes.len(),
            links: batch.links.len(),
        };
        info!("Upserted {} nodes and {} links", stats.nodes, stats.links);
        Ok(stats)
    }
}
