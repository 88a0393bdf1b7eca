//! Configuration management for gococo

pub mod schema;

pub use schema::Config;

use crate::cache::check_dir_name;
use crate::error::{GococoError, GococoResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "GOCOCO_CONFIG";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gococo")
            .join("config.toml")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> GococoResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> GococoResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| GococoError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| GococoError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        check_dir_name(&config.cache.dir_name).map_err(|e| GococoError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
