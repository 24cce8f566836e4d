//! Configuration management for worldgraph
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "WORLDGRAPH_HOME";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// SQLite connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Structural limits for the node hierarchy
    #[serde(default)]
    pub graph: GraphConfig,

    /// Chunk scheduler policy
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Bulk upsert settings
    #[serde(default)]
    pub upsert: UpsertConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a statement waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Graph configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Longest ancestor chain walked when a node changes parent
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds without a heartbeat before a processing chunk may be reclaimed
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Chunks claimed by a batch when no limit is given
    #[serde(default = "default_batch_limit")]
    pub default_batch_limit: usize,

    /// Upper bound for any batch claim
    #[serde(default = "default_max_batch_limit")]
    pub max_batch_limit: usize,

    /// Allow `done -> pending` transitions
    #[serde(default = "default_allow_reopen")]
    pub allow_reopen: bool,
}

/// Bulk upsert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertConfig {
    /// Records per transaction
    #[serde(default = "default_upsert_batch_size")]
    pub batch_size: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for worldgraph data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            default_batch_limit: default_batch_limit(),
            max_batch_limit: default_max_batch_limit(),
            allow_reopen: default_allow_reopen(),
        }
    }
}

impl SchedulerConfig {
    /// Lease length as a `Duration`
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for UpsertConfig {
    fn default() -> Self {
        Self {
            batch_size: default_upsert_batch_size(),
        }
    }
}

impl Config {
    /// Get the default base directory ($WORLDGRAPH_HOME or ~/.worldgraph)
    pub fn default_base_dir() -> PathBuf {
        if let Some(home) = std::env::var_os(HOME_ENV) {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".worldgraph")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("graph.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("graph.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if worldgraph is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be positive".to_string(),
            ));
        }

        if self.graph.max_depth == 0 {
            return Err(Error::Config("graph.max_depth must be positive".to_string()));
        }

        if self.scheduler.default_batch_limit == 0 || self.scheduler.max_batch_limit == 0 {
            return Err(Error::Config(
                "scheduler batch limits must be positive".to_string(),
            ));
        }

        if self.scheduler.default_batch_limit > self.scheduler.max_batch_limit {
            return Err(Error::Config(
                "scheduler.default_batch_limit must be <= scheduler.max_batch_limit".to_string(),
            ));
        }

        if self.upsert.batch_size == 0 {
            return Err(Error::Config("upsert.batch_size must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.stale_after_secs, 300);
        assert!(!config.scheduler.allow_reopen);
        assert_eq!(config.graph.max_depth, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.scheduler.allow_reopen = true;
        config.upsert.batch_size = 50;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(loaded.scheduler.allow_reopen);
        assert_eq!(loaded.upsert.batch_size, 50);
        assert_eq!(loaded.paths.db_file, tmp.path().join("graph.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\nstale_after_secs = 30\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.scheduler.stale_after(), Duration::from_secs(30));
        assert_eq!(config.scheduler.default_batch_limit, 16);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.scheduler.default_batch_limit = config.scheduler.max_batch_limit + 1;
        assert!(config.validate().is_err());

        config.scheduler.default_batch_limit = 8;
        assert!(config.validate().is_ok());

        config.graph.max_depth = 0;
        assert!(config.validate().is_err());
    }
}
