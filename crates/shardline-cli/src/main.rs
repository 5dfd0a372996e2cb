//! Shardline CLI - route user records across SQLite shards.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardline")]
#[command(author, version, long_about = None)]
#[command(about = "Shardline - application-layer shard routing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: shardline.toml in the current or a parent directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default shardline.toml
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Look up a user on its owning shard
    Get {
        /// User ID
        #[arg(allow_hyphen_values = true)]
        user_id: i64,
    },

    /// Create a user on its owning shard
    Create {
        /// User ID
        #[arg(allow_hyphen_values = true)]
        user_id: i64,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,
    },

    /// List users from every shard
    List,

    /// Show shard layout and health
    Info,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::Get { .. } => "get",
            Commands::Create { .. } => "create",
            Commands::List => "list",
            Commands::Info => "info",
        }
    }
}

/// Log filter used when `RUST_LOG` is not set.
fn default_log_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_level(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("Running {} command", cli.command.name());

    let output = commands::Output { json: cli.json };
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init { path } => commands::init::run(path),
        Commands::Get { user_id } => commands::get::run(config, user_id, output).await,
        Commands::Create {
            user_id,
            name,
            email,
        } => commands::create::run(config, user_id, name, email, output).await,
        Commands::List => commands::list::run(config, output).await,
        Commands::Info => commands::info::run(config, output).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(false), "info");
        assert_eq!(default_log_level(true), "debug");
    }

    #[test]
    fn test_command_names() {
        let cli = Cli::try_parse_from(["shardline", "get", "-7"]).unwrap();
        assert_eq!(cli.command.name(), "get");
        let cli = Cli::try_parse_from(["shardline", "--json", "list"]).unwrap();
        assert_eq!(cli.command.name(), "list");
        assert!(cli.json);
    }
}
