//! Node command implementation

use crate::attrs::{parse_attrs, AttrFilter};
use crate::db::{DeleteStats, GraphDb, Node, NodePatch, NodeQuery};
use crate::error::{Error, Result};
use tracing::info;

/// Flags accepted by `node update`
#[derive(Debug, Clone, Default)]
pub struct NodeUpdateOptions {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub clear_slug: bool,
    pub attrs: Option<String>,
    pub parent: Option<String>,
    pub detach: bool,
    pub chunk: Option<String>,
    pub clear_chunk: bool,
}

impl NodeUpdateOptions {
    /// Translate flags into a patch; `--clear-*`/`--detach` win over values
    pub fn into_patch(self) -> Result<NodePatch> {
        fn field(value: Option<String>, clear: bool) -> Option<Option<String>> {
            if clear {
                Some(None)
            } else {
                value.map(Some)
            }
        }

        let patch = NodePatch {
            name: self.name,
            slug: field(self.slug, self.clear_slug),
            attrs: self.attrs.as_deref().map(parse_attrs).transpose()?,
            parent_id: field(self.parent, self.detach),
            chunk_id: field(self.chunk, self.clear_chunk),
        };

        if patch.is_empty() {
            return Err(Error::Config("Nothing to update".to_string()));
        }
        Ok(patch)
    }
}

/// Flags accepted by `node find`
#[derive(Debug, Clone, Default)]
pub struct NodeFindOptions {
    pub node_type: Option<String>,
    pub chunk: Option<String>,
    pub parent: Option<String>,
    pub contains: Option<String>,
    pub has_keys: Vec<String>,
    pub limit: Option<usize>,
}

pub async fn cmd_find_nodes(db: &GraphDb, options: NodeFindOptions) -> Result<Vec<Node>> {
    let query = NodeQuery {
        node_type: options.node_type,
        chunk_id: options.chunk,
        parent_id: options.parent,
        attrs: AttrFilter {
            contains: options.contains.as_deref().map(parse_attrs).transpose()?,
            has_keys: options.has_keys,
        },
        limit: options.limit,
    };
    info!("Finding nodes");
    db.find_nodes(&query).await
}

pub fn print_node(node: &Node) {
    println!("• {} [{}]", node.name, node.node_type);
    println!("  ID: {}", node.id);
    if let Some(parent_id) = &node.parent_id {
        println!("  Parent: {}", parent_id);
    }
    if let Some(slug) = &node.slug {
        println!("  Slug: {}", slug);
    }
    if let Some(chunk_id) = &node.chunk_id {
        println!("  Chunk: {}", chunk_id);
    }
    if !node.attrs.is_empty() {
        println!(
            "  Attrs: {}",
            serde_json::Value::Object(node.attrs.clone())
        );
    }
    println!("  Updated: {}", node.updated_at);
}

pub fn print_nodes(nodes: &[Node]) {
    if nodes.is_empty() {
        println!("No nodes found.");
        return;
    }
    for node in nodes {
        print_node(node);
        println!();
    }
}

pub fn print_delete_stats(id: &str, stats: &DeleteStats) {
    println!("✓ Node '{}' deleted", id);
    println!("  Nodes removed: {}", stats.nodes);
    println!("  Links removed: {}", stats.links);
    println!("  Chunks removed: {}", stats.chunks);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_flags_build_patch() {
        let patch = NodeUpdateOptions {
            name: Some("Renamed".to_string()),
            parent: Some("p".to_string()),
            detach: true,
            attrs: Some(r#"{"k": 1}"#.to_string()),
            ..Default::default()
        }
        .into_patch()
        .unwrap();

        assert_eq!(patch.name.as_deref(), Some("Renamed"));
        assert_eq!(patch.parent_id, Some(None));
        assert_eq!(patch.slug, None);
        assert_eq!(patch.attrs.unwrap()["k"], 1);
    }

    #[test]
    fn test_empty_update_is_rejected() {
        assert!(NodeUpdateOptions::default().into_patch().is_err());
        assert!(NodeUpdateOptions {
            attrs: Some("[]".to_string()),
            ..Default::default()
        }
        .into_patch()
        .is_err());
    }
}
