//! Init command implementation

use crate::config::Config;
use crate::db::GraphDb;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub force: bool,
}

/// Write a default config and create the graph database
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(Some(options.base_dir));

    if config.paths.config_file.exists() && !options.force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config.paths.config_file.display()
        )));
    }

    config.validate()?;
    config.save()?;

    let db = GraphDb::open(&config).await?;
    db.close().await;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(config)
}

pub fn print_init(config: &Config) {
    println!("✓ worldgraph initialized");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Database: {}", config.paths.db_file.display());
}
