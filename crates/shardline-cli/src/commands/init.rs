//! Initialize a shardline project.

use anyhow::{Context, Result};
use colored::Colorize;
use shardline_router::CONFIG_FILE_NAME;
use std::path::PathBuf;

use crate::config::write_default;

pub fn run(path: Option<PathBuf>) -> Result<()> {
    let base_path = match path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    println!("{} Initializing shardline project...", "→".blue());

    let data_dir = base_path.join("data");
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    println!("  {} Created {}", "✓".green(), data_dir.display());

    let config_path = base_path.join(CONFIG_FILE_NAME);
    if write_default(&config_path)? {
        println!("  {} Created {}", "✓".green(), config_path.display());
    } else {
        println!("  {} {} already exists", "•".yellow(), config_path.display());
    }

    println!();
    println!("Next steps:");
    println!("  {} shardline create 3 --name Ada --email ada@example.com", "1.".blue());
    println!("  {} shardline get 3", "2.".blue());
    println!("  {} shardline list", "3.".blue());

    Ok(())
}
