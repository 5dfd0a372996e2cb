//! Router configuration.
//!
//! The shard list is an ordered `[[shards]]` array; the position of each
//! entry is its shard index. Example `shardline.toml`:
//!
//! ```toml
//! [router]
//! shard_timeout_ms = 5000
//!
//! [[shards]]
//! backend = "sqlite"
//! path = "data/shard0.db"
//! pool_size = 8
//!
//! [[shards]]
//! backend = "sqlite"
//! path = "data/shard1.db"
//! ```

use serde::{Deserialize, Serialize};
use shardline_core::ShardDescriptor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// File name searched for by `RouterConfig::discover`.
pub const CONFIG_FILE_NAME: &str = "shardline.toml";

/// Default per-shard timeout for scatter-gather reads, in milliseconds.
pub const DEFAULT_SHARD_TIMEOUT_MS: u64 = 5000;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime options of the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterOptions {
    /// Upper bound on each shard's part of a scatter-gather read.
    pub shard_timeout: Duration,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            shard_timeout: Duration::from_millis(DEFAULT_SHARD_TIMEOUT_MS),
        }
    }
}

impl RouterOptions {
    /// Set the per-shard timeout.
    pub fn with_shard_timeout(mut self, timeout: Duration) -> Self {
        self.shard_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSection {
    #[serde(default = "default_shard_timeout_ms")]
    pub shard_timeout_ms: u64,
}

fn default_shard_timeout_ms() -> u64 {
    DEFAULT_SHARD_TIMEOUT_MS
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            shard_timeout_ms: default_shard_timeout_ms(),
        }
    }
}

/// Complete router configuration: options plus the ordered shard list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub shards: Vec<ShardDescriptor>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            router: RouterSection::default(),
            shards: vec![
                ShardDescriptor::sqlite("data/shard0.db"),
                ShardDescriptor::sqlite("data/shard1.db"),
            ],
        }
    }
}

impl RouterConfig {
    /// Build a config from an ordered shard list with default options.
    pub fn with_shards(shards: Vec<ShardDescriptor>) -> Self {
        Self {
            router: RouterSection::default(),
            shards,
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading router config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        debug!("Router config: {:?}", config);
        Ok(config)
    }

    /// Make relative SQLite paths relative to `base` instead of the
    /// working directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        for shard in &mut self.shards {
            if let ShardDescriptor::Sqlite { path, .. } = shard {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    /// Load `shardline.toml` from the current or a parent directory.
    ///
    /// Returns `Ok(None)` when no config file exists.
    pub fn discover() -> Result<Option<Self>, ConfigError> {
        match find_config_file() {
            Some(path) => Self::load(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Reject configurations the router could not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one shard must be configured".to_string(),
            ));
        }
        if u32::try_from(self.shards.len()).is_err() {
            return Err(ConfigError::Invalid(format!(
                "too many shards: {}",
                self.shards.len()
            )));
        }
        if self.router.shard_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "shard_timeout_ms must be greater than 0".to_string(),
            ));
        }
        for (i, shard) in self.shards.iter().enumerate() {
            if let ShardDescriptor::Sqlite { pool_size: Some(0), .. } = shard {
                return Err(ConfigError::Invalid(format!(
                    "shard {} has pool_size 0",
                    i
                )));
            }
        }
        Ok(())
    }

    /// The router options described by this config.
    pub fn options(&self) -> RouterOptions {
        RouterOptions {
            shard_timeout: Duration::from_millis(self.router.shard_timeout_ms),
        }
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Default config as a TOML string.
    pub fn default_toml() -> Result<String, ConfigError> {
        RouterConfig::default().to_toml()
    }
}

/// Find `shardline.toml` in the current or parent directories.
fn find_config_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}
