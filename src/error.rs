//! Custom error types for worldgraph

use crate::db::ChunkStatus;
use thiserror::Error;

/// Main error type for worldgraph operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Parent node does not exist: {0}")]
    InvalidParent(String),

    #[error("Link endpoint does not exist: {0}")]
    InvalidEndpoint(String),

    #[error("Chunk scope node does not exist: {0}")]
    InvalidScope(String),

    #[error("Moving node {node_id} under {parent_id} would create a cycle")]
    CycleDetected { node_id: String, parent_id: String },

    #[error("Ancestor chain deeper than {0} levels")]
    MaxDepthExceeded(usize),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Chunk already claimed: {0}")]
    AlreadyClaimed(String),

    #[error("Worker token does not own chunk {0}")]
    NotOwner(String),

    #[error("Cannot {action} chunk {chunk_id} in status '{from}'")]
    InvalidTransition {
        chunk_id: String,
        from: ChunkStatus,
        action: &'static str,
    },

    #[error("Reopening completed chunks is disabled (scheduler.allow_reopen = false)")]
    ReopenDisabled,

    #[error("Not initialized: run 'worldgraph init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Another worker won the claim; move on to the next candidate.
    pub fn is_contention(&self) -> bool {
        matches!(self, Error::AlreadyClaimed(_))
    }

    /// The caller's lease on a chunk expired or was reassigned.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, Error::NotOwner(_))
    }

    /// True when the database rejected a write because of a duplicate key.
    pub(crate) fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        // Alternate form keeps the whole context chain
        Error::Other(format!("{:#}", err))
    }
}

/// Result type alias for worldgraph
pub type Result<T> = std::result::Result<T, Error>;
