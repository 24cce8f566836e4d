//! worldgraph - persistence layer for a generated content graph
//!
//! This crate provides:
//! - Node, link and chunk storage on SQLite with cascading deletes
//! - A lease-based scheduler handing chunks to concurrent workers
//! - JSON attribute predicates shared by every entity
//! - A CLI for inspecting and driving the store

pub mod attrs;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod progress;
pub mod scheduler;

pub use config::Config;
pub use db::GraphDb;
pub use error::{Error, Result};
pub use scheduler::{ChunkScheduler, Outcome};
