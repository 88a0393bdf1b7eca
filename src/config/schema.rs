//! Configuration schema for gococo
//!
//! Configuration is stored at `~/.config/gococo/config.toml`

use crate::cache::{check_dir_name, DEFAULT_CACHE_DIR, DEFAULT_LOCK_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::error::GococoResult;
use crate::toolchain::CoverMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the cache directory name
pub const CACHE_DIR_ENV: &str = "GOCOCO_CACHE_DIR";

/// Environment variable enabling debug logging
pub const DEBUG_ENV: &str = "GOCOCO_DEBUG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Shadow cache settings
    pub cache: CacheConfig,

    /// Compile lock settings
    pub lock: LockConfig,

    /// Go toolchain settings
    pub toolchain: ToolchainConfig,
}

impl Config {
    /// Apply `GOCOCO_CACHE_DIR` and `GOCOCO_DEBUG` on top of the file values
    pub fn apply_env(&mut self) -> GococoResult<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> GococoResult<()> {
        if let Some(dir) = var(CACHE_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            check_dir_name(&dir)?;
            debug!("{} overrides cache dir with {}", CACHE_DIR_ENV, dir);
            self.cache.dir_name = dir;
        }
        if let Some(flag) = var(DEBUG_ENV) {
            self.general.debug = matches!(flag.trim(), "1" | "true" | "TRUE" | "True");
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable debug logging
    pub debug: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            debug: false,
        }
    }
}

/// Shadow cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory name under the project root
    pub dir_name: String,

    /// Extra paths never mirrored, relative to the project root
    pub exclude: Vec<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir_name: DEFAULT_CACHE_DIR.to_string(),
            exclude: vec![],
        }
    }
}

/// Compile lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Time to wait for another invocation (default: 6 minutes)
    pub timeout_secs: u64,

    /// Delay between acquisition attempts
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_LOCK_TIMEOUT.as_secs(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Go toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// go binary to run
    pub go: PathBuf,

    /// Counter mode for `go tool cover`: set, count or atomic
    pub cover_mode: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            go: PathBuf::from("go"),
            cover_mode: CoverMode::default().to_string(),
        }
    }
}

impl ToolchainConfig {
    pub fn cover_mode(&self) -> GococoResult<CoverMode> {
        self.cover_mode.parse()
    }
}
