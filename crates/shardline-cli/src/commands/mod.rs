//! CLI command implementations.

pub mod create;
pub mod get;
pub mod info;
pub mod init;
pub mod list;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use shardline_core::{ShardId, User};
use shardline_router::ShardRouter;
use std::path::Path;
use tracing::{debug, info};

/// How command results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    /// Print `value` as pretty JSON.
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        println!("{}", text);
        Ok(())
    }
}

/// Load the config and connect to every shard.
pub async fn connect(config: Option<&Path>) -> Result<ShardRouter> {
    let config = crate::config::load(config)?;
    debug!("Loaded config with {} shard(s)", config.shards.len());
    let router = ShardRouter::from_config(&config)
        .await
        .context("Failed to start shard router")?;
    info!("Connected to {} shard(s)", router.shard_count());
    Ok(router)
}

fn print_user(user: &User, shard: ShardId) {
    println!(
        "  {} {} <{}> {}",
        user.user_id.to_string().cyan(),
        user.name.white().bold(),
        user.email,
        format!("({}, created {})", shard, user.created_at).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_from_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shardline.toml");
        std::fs::write(
            &path,
            "[[shards]]\nbackend = \"memory\"\n\n[[shards]]\nbackend = \"memory\"\n",
        )
        .unwrap();

        let router = connect(Some(&path)).await.unwrap();
        assert_eq!(router.shard_count(), 2);
    }

    #[tokio::test]
    async fn test_connect_reports_missing_config() {
        let dir = TempDir::new().unwrap();
        let err = connect(Some(&dir.path().join("absent.toml"))).await.unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
