//! Benchmark runner binary for shardline-bench.
//!
//! Run with: cargo run --bin shardline-bench --release -- --db bench.db

use anyhow::{Context, Result};
use clap::Parser;
use shardline_bench::{BenchConfig, BenchmarkHarness};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardline-bench")]
#[command(author, version, long_about = None)]
#[command(about = "Compare pooled and unpooled SQLite connections")]
struct Cli {
    /// SQLite database file to run against (created if missing)
    #[arg(long, default_value = "bench.db")]
    db: PathBuf,

    /// Connection pool size
    #[arg(long, default_value = "10")]
    pool_size: usize,

    /// Number of concurrent operations
    #[arg(long, default_value = "200")]
    concurrency: usize,

    /// Total operations per strategy
    #[arg(long, default_value = "5000")]
    operations: usize,

    /// Statement executed by every operation
    #[arg(long, default_value = "SELECT 1")]
    query: String,

    /// Per-operation timeout in milliseconds
    #[arg(long, default_value = "5000")]
    op_timeout_ms: u64,

    /// Print results as CSV instead of a summary
    #[arg(long)]
    csv: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = BenchConfig::new(cli.db)
        .with_pool_size(cli.pool_size)
        .with_concurrency(cli.concurrency)
        .with_operations(cli.operations)
        .with_query(cli.query)
        .with_op_timeout(Duration::from_millis(cli.op_timeout_ms));

    let harness = BenchmarkHarness::new(config)?.with_progress(!cli.csv);

    if !cli.csv {
        let config = harness.config();
        println!("Connection Pool Benchmark");
        println!("Database: {}", config.database.display());
        println!("Pool Size: {}", config.pool_size);
        println!("Concurrency: {}", config.concurrency);
        println!("Operations: {}", config.operations);
        println!();
    }

    harness
        .preflight()
        .await
        .context("Database connection failed")?;
    if !cli.csv {
        println!("Database connection successful\n");
    }

    let report = harness
        .run_comparison()
        .await
        .context("Benchmark failed")?;
    if cli.csv {
        print!("{}", report.to_csv());
    } else {
        report.print();
    }

    Ok(())
}
