//! Config lookup for the CLI.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use shardline_router::{RouterConfig, CONFIG_FILE_NAME};
use std::path::Path;

/// Load the config from `path`, or discover `shardline.toml` when no path
/// is given.
pub fn load(path: Option<&Path>) -> Result<RouterConfig> {
    if let Some(path) = path {
        return RouterConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()));
    }
    match RouterConfig::discover().context("Failed to load config")? {
        Some(config) => Ok(config),
        None => bail!(
            "No {} found. Run {} first or pass --config.",
            CONFIG_FILE_NAME,
            "shardline init".cyan()
        ),
    }
}

/// Write the default config to `path`. Returns false if the file exists.
pub fn write_default(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let content = RouterConfig::default_toml().context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(true)
}
