//! worldgraph CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use worldgraph::{
    attrs::parse_attrs,
    commands::{
        cmd_find_nodes, cmd_init, cmd_list_chunks, cmd_status, cmd_upsert, deleted_report,
        optional_attrs, print_chunk, print_chunk_stats, print_chunks, print_delete_stats,
        print_init, print_link, print_links, print_node, print_nodes, print_status,
        print_upsert_stats, reclaim_report, ChunkListOptions, InitOptions, NodeFindOptions,
        NodeUpdateOptions,
    },
    config::Config,
    db::{GraphDb, NewChunk, NewLink, NewNode},
    error::{Error, Result},
    progress::LogWriterFactory,
    scheduler::{ChunkScheduler, Outcome},
};

#[derive(Parser)]
#[command(name = "worldgraph")]
#[command(version, about = "Content graph store with a lease-based chunk scheduler", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize worldgraph configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and graph statistics
    Status,

    /// Manage nodes
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },

    /// Manage links
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Manage chunks and their processing lifecycle
    Chunk {
        #[command(subcommand)]
        action: ChunkAction,
    },

    /// Insert or update nodes and links from a JSON document
    Upsert {
        /// File containing {"nodes": [...], "links": [...]}
        file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum NodeAction {
    /// Create a node
    Create {
        node_type: String,
        name: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        /// Chunk this node was generated under
        #[arg(long)]
        chunk: Option<String>,
        /// JSON object of attributes
        #[arg(long)]
        attrs: Option<String>,
    },

    /// Show a node
    Get { id: String },

    /// Change a node's fields
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        clear_slug: bool,
        /// Replacement JSON object of attributes
        #[arg(long)]
        attrs: Option<String>,
        /// Move under this parent
        #[arg(long)]
        parent: Option<String>,
        /// Make the node a root
        #[arg(long, conflicts_with = "parent")]
        detach: bool,
        #[arg(long)]
        chunk: Option<String>,
        #[arg(long, conflicts_with = "chunk")]
        clear_chunk: bool,
    },

    /// Delete a node with its subtree, links and chunks
    Delete { id: String },

    /// List direct children in creation order
    Children { id: String },

    /// List ancestors from the parent up to the root
    Ancestors { id: String },

    /// Find nodes by type, chunk, parent and attributes
    Find {
        #[arg(long = "type")]
        node_type: Option<String>,
        #[arg(long)]
        chunk: Option<String>,
        #[arg(long)]
        parent: Option<String>,
        /// JSON object the attrs must contain
        #[arg(long)]
        contains: Option<String>,
        /// Top-level attribute key that must exist (repeatable)
        #[arg(long = "has-key")]
        has_keys: Vec<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum LinkAction {
    /// Create a link between two existing nodes
    Create {
        src: String,
        dst: String,
        link_type: String,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        attrs: Option<String>,
    },

    /// Show a link
    Get { id: String },

    /// Delete a link
    Delete { id: String },

    /// Links leaving a node
    Out {
        node_id: String,
        #[arg(long = "type")]
        link_type: Option<String>,
    },

    /// Links arriving at a node
    In {
        node_id: String,
        #[arg(long = "type")]
        link_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum ChunkAction {
    /// Create a pending chunk scoped to a node
    Create {
        chunk_id: String,
        scope_type: String,
        scope_node: String,
        #[arg(long)]
        attrs: Option<String>,
    },

    /// Show a chunk
    Get { chunk_id: String },

    /// Delete a chunk
    Delete { chunk_id: String },

    /// List chunks, least recently updated first
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        scope_type: Option<String>,
        #[arg(long)]
        scope_node: Option<String>,
        #[arg(long)]
        contains: Option<String>,
        #[arg(long = "has-key")]
        has_keys: Vec<String>,
    },

    /// Count the nodes and links produced under a chunk
    Stats { chunk_id: String },

    /// Claim a pending chunk
    Claim {
        chunk_id: String,
        #[arg(long, env = "WORLDGRAPH_WORKER")]
        token: String,
    },

    /// Claim several pending chunks, oldest first
    ClaimBatch {
        #[arg(long, env = "WORLDGRAPH_WORKER")]
        token: String,
        #[arg(long)]
        scope_type: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Report the outcome of a claimed chunk
    Complete {
        chunk_id: String,
        #[arg(long, env = "WORLDGRAPH_WORKER")]
        token: String,
        /// success or failure
        #[arg(long, default_value = "success")]
        outcome: Outcome,
        /// JSON merge patch applied to the chunk's attrs
        #[arg(long)]
        attrs: Option<String>,
    },

    /// Extend the lease on a claimed chunk
    Heartbeat {
        chunk_id: String,
        #[arg(long, env = "WORLDGRAPH_WORKER")]
        token: String,
        #[arg(long)]
        attrs: Option<String>,
    },

    /// Return a failed chunk to pending
    Retry { chunk_id: String },

    /// Return a done chunk to pending (requires scheduler.allow_reopen)
    Reopen { chunk_id: String },

    /// Return abandoned processing chunks to pending
    Reclaim {
        /// Staleness threshold in seconds (defaults to scheduler.stale_after_secs)
        #[arg(long)]
        older_than: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let base_dir = cli
                .config
                .as_deref()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_base_dir);
            let config = cmd_init(InitOptions { base_dir, force }).await?;
            print_init(&config);
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "worldgraph", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(cli.config.as_deref())?;
    let db = GraphDb::open(&config).await?;
    let json = cli.json;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            emit(json, &status, print_status)?;
        }

        Commands::Node { action } => handle_node(&db, action, json).await?,
        Commands::Link { action } => handle_link(&db, action, json).await?,
        Commands::Chunk { action } => handle_chunk(&config, &db, action, json).await?,

        Commands::Upsert { file } => {
            let stats = cmd_upsert(&config, &db, &file).await?;
            emit(json, &stats, print_upsert_stats)?;
        }
    }

    db.close().await;
    Ok(())
}

/// Print `value` as pretty JSON or through its human-readable printer
fn emit<T: Serialize + ?Sized>(json: bool, value: &T, print: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

async fn handle_node(db: &GraphDb, action: NodeAction, json: bool) -> Result<()> {
    match action {
        NodeAction::Create {
            node_type,
            name,
            parent,
            slug,
            chunk,
            attrs,
        } => {
            let new = NewNode {
                node_type,
                name,
                parent_id: parent,
                slug,
                chunk_id: chunk,
                attrs: optional_attrs(attrs.as_deref())?.unwrap_or_default(),
            };
            let node = db.create_node(new).await?;
            emit(json, &node, print_node)?;
        }
        NodeAction::Get { id } => {
            let node = db.get_node(&id).await?;
            emit(json, &node, print_node)?;
        }
        NodeAction::Update {
            id,
            name,
            slug,
            clear_slug,
            attrs,
            parent,
            detach,
            chunk,
            clear_chunk,
        } => {
            let patch = NodeUpdateOptions {
                name,
                slug,
                clear_slug,
                attrs,
                parent,
                detach,
                chunk,
                clear_chunk,
            }
            .into_patch()?;
            let node = db.update_node(&id, patch).await?;
            emit(json, &node, print_node)?;
        }
        NodeAction::Delete { id } => {
            let stats = db.delete_node(&id).await?;
            emit(json, &stats, |stats| print_delete_stats(&id, stats))?;
        }
        NodeAction::Children { id } => {
            let children = db.children(&id).await?;
            emit(json, children.as_slice(), print_nodes)?;
        }
        NodeAction::Ancestors { id } => {
            let ancestors = db.ancestors(&id).await?;
            emit(json, ancestors.as_slice(), print_nodes)?;
        }
        NodeAction::Find {
            node_type,
            chunk,
            parent,
            contains,
            has_keys,
            limit,
        } => {
            let nodes = cmd_find_nodes(
                db,
                NodeFindOptions {
                    node_type,
                    chunk,
                    parent,
                    contains,
                    has_keys,
                    limit,
                },
            )
            .await?;
            emit(json, nodes.as_slice(), print_nodes)?;
        }
    }
    Ok(())
}

async fn handle_link(db: &GraphDb, action: LinkAction, json: bool) -> Result<()> {
    match action {
        LinkAction::Create {
            src,
            dst,
            link_type,
            weight,
            attrs,
        } => {
            let mut new = NewLink::new(src, dst, link_type);
            new.weight = weight;
            if let Some(raw) = attrs.as_deref() {
                new = new.with_attrs(parse_attrs(raw)?);
            }
            let link = db.create_link(new).await?;
            emit(json, &link, print_link)?;
        }
        LinkAction::Get { id } => {
            let link = db.get_link(&id).await?;
            emit(json, &link, print_link)?;
        }
        LinkAction::Delete { id } => {
            db.delete_link(&id).await?;
            emit(json, &deleted_report(&id), |_| {
                println!("✓ Link '{}' deleted", id)
            })?;
        }
        LinkAction::Out { node_id, link_type } => {
            let links = db.list_outbound(&node_id, link_type.as_deref()).await?;
            emit(json, links.as_slice(), print_links)?;
        }
        LinkAction::In { node_id, link_type } => {
            let links = db.list_inbound(&node_id, link_type.as_deref()).await?;
            emit(json, links.as_slice(), print_links)?;
        }
    }
    Ok(())
}

async fn handle_chunk(
    config: &Config,
    db: &GraphDb,
    action: ChunkAction,
    json: bool,
) -> Result<()> {
    let scheduler = ChunkScheduler::new(db.clone(), config.scheduler.clone());

    match action {
        ChunkAction::Create {
            chunk_id,
            scope_type,
            scope_node,
            attrs,
        } => {
            let new = NewChunk::new(chunk_id, scope_type, scope_node)
                .with_attrs(optional_attrs(attrs.as_deref())?.unwrap_or_default());
            let chunk = db.create_chunk(new).await?;
            emit(json, &chunk, print_chunk)?;
        }
        ChunkAction::Get { chunk_id } => {
            let chunk = db.get_chunk(&chunk_id).await?;
            emit(json, &chunk, print_chunk)?;
        }
        ChunkAction::Delete { chunk_id } => {
            db.delete_chunk(&chunk_id).await?;
            emit(json, &deleted_report(&chunk_id), |_| {
                println!("✓ Chunk '{}' deleted", chunk_id)
            })?;
        }
        ChunkAction::List {
            status,
            scope_type,
            scope_node,
            contains,
            has_keys,
        } => {
            let chunks = cmd_list_chunks(
                db,
                ChunkListOptions {
                    status,
                    scope_type,
                    scope_node,
                    contains,
                    has_keys,
                },
            )
            .await?;
            emit(json, chunks.as_slice(), print_chunks)?;
        }
        ChunkAction::Stats { chunk_id } => {
            let stats = db.chunk_stats(&chunk_id).await?;
            emit(json, &stats, print_chunk_stats)?;
        }
        ChunkAction::Claim { chunk_id, token } => {
            let chunk = scheduler.claim(&chunk_id, &token).await?;
            emit(json, &chunk, print_chunk)?;
        }
        ChunkAction::ClaimBatch {
            token,
            scope_type,
            limit,
        } => {
            let limit = limit.unwrap_or(config.scheduler.default_batch_limit);
            let chunks = scheduler
                .claim_batch(&token, scope_type.as_deref(), limit)
                .await?;
            emit(json, chunks.as_slice(), print_chunks)?;
        }
        ChunkAction::Complete {
            chunk_id,
            token,
            outcome,
            attrs,
        } => {
            let attrs = optional_attrs(attrs.as_deref())?;
            let chunk = scheduler.complete(&chunk_id, &token, outcome, attrs).await?;
            emit(json, &chunk, print_chunk)?;
        }
        ChunkAction::Heartbeat {
            chunk_id,
            token,
            attrs,
        } => {
            let attrs = optional_attrs(attrs.as_deref())?;
            let chunk = scheduler.heartbeat(&chunk_id, &token, attrs).await?;
            emit(json, &chunk, print_chunk)?;
        }
        ChunkAction::Retry { chunk_id } => {
            let chunk = scheduler.retry(&chunk_id).await?;
            emit(json, &chunk, print_chunk)?;
        }
        ChunkAction::Reopen { chunk_id } => {
            let chunk = scheduler.reopen(&chunk_id).await?;
            emit(json, &chunk, print_chunk)?;
        }
        ChunkAction::Reclaim { older_than } => {
            let reclaimed = match older_than {
                Some(secs) => scheduler.reclaim_stale(Duration::from_secs(secs)).await?,
                None => scheduler.reclaim_expired().await?,
            };
            emit(json, &reclaim_report(reclaimed), |_| {
                println!("✓ Reclaimed {} stale chunks", reclaimed)
            })?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!("Config file not found: {}", config_path.display());
        return Err(Error::NotInitialized);
    }

    Config::load(&config_path)
}
