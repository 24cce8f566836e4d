//! Upsert command implementation
//!
//! Applies a `{ "nodes": [...], "links": [...] }` document in transactions of
//! `upsert.batch_size` records. Each transaction is atomic; a failing batch
//! stops the run and leaves earlier batches committed.

use crate::config::Config;
use crate::db::{BulkUpsert, GraphDb, NodeRecord, UpsertStats};
use crate::error::Result;
use crate::progress::upsert_progress_bar;
use anyhow::Context;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

pub async fn cmd_upsert(config: &Config, db: &GraphDb, path: &Path) -> Result<UpsertStats> {
    info!("Reading {:?}", path);
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut document: BulkUpsert = serde_json::from_str(&content)
        .with_context(|| format!("Invalid upsert document {}", path.display()))?;
    document.nodes = parents_first(document.nodes);

    let batches = split_batches(document, config.upsert.batch_size);
    let bar = upsert_progress_bar(batches.iter().map(BulkUpsert::len).sum::<usize>() as u64);

    let mut total = UpsertStats::default();
    for batch in &batches {
        let stats = db.bulk_upsert(batch).await?;
        total.nodes += stats.nodes;
        total.links += stats.links;
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();

    Ok(total)
}

/// Order nodes so every in-document parent precedes its children.
///
/// Parents outside the document are assumed to exist already. Cyclic input is
/// left for the database to reject.
fn parents_first(nodes: Vec<NodeRecord>) -> Vec<NodeRecord> {
    let parents: HashMap<&str, Option<&str>> = nodes
        .iter()
        .map(|n| (n.id.as_str(), n.parent_id.as_deref()))
        .collect();

    let depths: Vec<usize> = nodes
        .iter()
        .map(|node| {
            let mut depth = 0;
            let mut cursor = node.parent_id.as_deref();
            while let Some(Some(next)) = cursor.map(|id| parents.get(id).copied()) {
                depth += 1;
                if depth > nodes.len() {
                    break;
                }
                cursor = next;
            }
            depth
        })
        .collect();

    let mut indexed: Vec<(usize, NodeRecord)> = depths.into_iter().zip(nodes).collect();
    indexed.sort_by_key(|(depth, _)| *depth);
    indexed.into_iter().map(|(_, node)| node).collect()
}

/// Nodes first, then links, `batch_size` records per batch
fn split_batches(document: BulkUpsert, batch_size: usize) -> Vec<BulkUpsert> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();

    for nodes in document.nodes.chunks(batch_size) {
        batches.push(BulkUpsert {
            nodes: nodes.to_vec(),
            links: Vec::new(),
        });
    }
    for links in document.links.chunks(batch_size) {
        batches.push(BulkUpsert {
            nodes: Vec::new(),
            links: links.to_vec(),
        });
    }

    batches
}

pub fn print_upsert_stats(stats: &UpsertStats) {
    println!("\n✓ Upsert complete");
    println!("  Nodes written: {}", stats.nodes);
    println!("  Links written: {}", stats.links);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::Attrs;
    use crate::error::Error;
    use tempfile::TempDir;

    fn record(id: &str, parent: Option<&str>) -> NodeRecord {
        NodeRecord {
            id: id.to_string(),
            node_type: "place".to_string(),
            name: id.to_string(),
            parent_id: parent.map(str::to_string),
            slug: None,
            chunk_id: None,
            attrs: Attrs::new(),
        }
    }

    #[test]
    fn test_parents_first_orders_by_depth() {
        let ordered = parents_first(vec![
            record("street", Some("city")),
            record("city", Some("country")),
            record("country", None),
            record("orphan", Some("elsewhere")),
        ]);
        let ids: Vec<&str> = ordered.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["country", "orphan", "city", "street"]);
    }

    #[test]
    fn test_parents_first_terminates_on_cycles() {
        let ordered = parents_first(vec![record("a", Some("b")), record("b", Some("a"))]);
        assert_eq!(ordered.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_file_in_small_batches() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.upsert.batch_size = 1;
        let db = GraphDb::open(&config).await.unwrap();

        let path = tmp.path().join("world.json");
        std::fs::write(
            &path,
            r#"{
                "nodes": [
                    { "id": "city", "node_type": "city", "name": "City", "parent_id": "land" },
                    { "id": "land", "node_type": "country", "name": "Land" }
                ],
                "links": [
                    { "id": "l1", "src_id": "city", "dst_id": "land", "link_type": "capital_of" }
                ]
            }"#,
        )
        .unwrap();

        let stats = cmd_upsert(&config, &db, &path).await.unwrap();
        assert_eq!(stats, UpsertStats { nodes: 2, links: 1 });
        assert_eq!(
            db.get_node("city").await.unwrap().parent_id.as_deref(),
            Some("land")
        );
    }

    #[tokio::test]
    async fn test_unreadable_documents_name_the_file() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let db = GraphDb::open(&config).await.unwrap();

        let missing = tmp.path().join("missing.json");
        match cmd_upsert(&config, &db, &missing).await {
            Err(Error::Other(message)) => assert!(message.contains("missing.json")),
            other => panic!("unexpected result: {:?}", other),
        }

        let broken = tmp.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        match cmd_upsert(&config, &db, &broken).await {
            Err(Error::Other(message)) => {
                assert!(message.starts_with("Invalid upsert document"));
                assert!(message.contains("broken.json"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
