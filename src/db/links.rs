//! Link storage: typed, directed, weighted edges

use super::{now, GraphDb};
use crate::attrs::{AttrFilter, Attrs};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::debug;
use uuid::Uuid;

/// A directed edge between two existing nodes
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub src_id: String,
    pub dst_id: String,
    pub link_type: String,
    pub weight: Option<f64>,
    #[sqlx(json)]
    pub attrs: Attrs,
    pub created_at: String,
}

/// Fields for a link about to be created
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewLink {
    pub src_id: String,
    pub dst_id: String,
    pub link_type: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub attrs: Attrs,
}

impl NewLink {
    pub fn new(
        src_id: impl Into<String>,
        dst_id: impl Into<String>,
        link_type: impl Into<String>,
    ) -> Self {
        Self {
            src_id: src_id.into(),
            dst_id: dst_id.into(),
            link_type: link_type.into(),
            ..Default::default()
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> Self {
        self.attrs = attrs;
        self
    }
}

/// Which end of a link a listing is anchored on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    fn column(self) -> &'static str {
        match self {
            Direction::Outbound => "src_id",
            Direction::Inbound => "dst_id",
        }
    }
}

impl GraphDb {
    // ===== Link Operations =====

    /// Create a link; both endpoints must exist
    pub async fn create_link(&self, new: NewLink) -> Result<Link> {
        let link = Link {
            id: Uuid::new_v4().to_string(),
            src_id: new.src_id,
            dst_id: new.dst_id,
            link_type: new.link_type,
            weight: new.weight,
            attrs: new.attrs,
            created_at: now(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO links (id, src_id, dst_id, link_type, weight, attrs, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
            WHERE EXISTS (SELECT 1 FROM nodes WHERE id = ?2)
              AND EXISTS (SELECT 1 FROM nodes WHERE id = ?3)
            "#,
        )
        .bind(&link.id)
        .bind(&link.src_id)
        .bind(&link.dst_id)
        .bind(&link.link_type)
        .bind(link.weight)
        .bind(Json(&link.attrs))
        .bind(&link.created_at)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            let src_exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM nodes WHERE id = ?")
                .bind(&link.src_id)
                .fetch_optional(self.pool())
                .await?;
            let missing = if src_exists.is_none() {
                link.src_id
            } else {
                link.dst_id
            };
            return Err(Error::InvalidEndpoint(missing));
        }

        debug!(
            "Created {} link {} ({} -> {})",
            link.link_type, link.id, link.src_id, link.dst_id
        );
        Ok(link)
    }

    /// Get link by ID
    pub async fn get_link(&self, id: &str) -> Result<Link> {
        sqlx::query_as::<_, Link>("SELECT * FROM links WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| Error::not_found("link", id))
    }

    /// Delete a link
    pub async fn delete_link(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM links WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("link", id));
        }
        debug!("Deleted link {}", id);
        Ok(())
    }

    /// Links leaving `node_id`, optionally of one type, in insertion order
    pub async fn list_outbound(&self, node_id: &str, link_type: Option<&str>) -> Result<Vec<Link>> {
        self.list_links(Direction::Outbound, node_id, link_type)
            .await
    }

    /// Links arriving at `node_id`, optionally of one type, in insertion order
    pub async fn list_inbound(&self, node_id: &str, link_type: Option<&str>) -> Result<Vec<Link>> {
        self.list_links(Direction::Inbound, node_id, link_type)
            .await
    }

    async fn list_links(
        &self,
        direction: Direction,
        node_id: &str,
        link_type: Option<&str>,
    ) -> Result<Vec<Link>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM links WHERE ");
        builder.push(direction.column()).push(" = ").push_bind(node_id);
        if let Some(link_type) = link_type {
            builder.push(" AND link_type = ").push_bind(link_type);
        }
        builder.push(" ORDER BY created_at, rowid");

        let links = builder.build_query_as::<Link>().fetch_all(self.pool()).await?;
        Ok(links)
    }

    /// Find links by type and attribute predicates
    pub async fn find_links(&self, link_type: Option<&str>, filter: &AttrFilter) -> Result<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT * FROM links WHERE ?1 IS NULL OR link_type = ?1 ORDER BY created_at, rowid",
        )
        .bind(link_type)
        .fetch_all(self.pool())
        .await?;

        Ok(links
            .into_iter()
            .filter(|link| filter.matches(&link.attrs))
            .collect())
    }
}
