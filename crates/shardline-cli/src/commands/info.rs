//! Show shard layout and health.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use shardline_core::ShardHealth;
use std::path::Path;

use super::{connect, Output};

#[derive(Serialize)]
struct ShardInfo {
    #[serde(flatten)]
    health: ShardHealth,
    backend: String,
}

pub async fn run(config: Option<&Path>, output: Output) -> Result<()> {
    let router = connect(config).await?;
    let health = router.health().await;
    let shards: Vec<ShardInfo> = router
        .describe_shards()
        .into_iter()
        .zip(health)
        .map(|((_, backend), health)| ShardInfo { health, backend })
        .collect();

    if output.json {
        return output.print_json(&shards);
    }

    println!("{}", "Shardline Router".white().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!(
        "  Shards:        {}",
        router.shard_count().to_string().cyan()
    );
    println!("  Shard timeout: {:?}", router.options().shard_timeout);
    println!();

    for shard in &shards {
        let status = if shard.health.healthy {
            "healthy".green()
        } else {
            "unhealthy".red()
        };
        println!("  {} {} {}", shard.health.shard, status, shard.backend.dimmed());
        if let Some(error) = &shard.health.error {
            println!("      {}", error.red());
        }
    }
    println!("{}", "═".repeat(40).dimmed());

    Ok(())
}
