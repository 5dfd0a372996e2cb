//! # Shardline Bench
//!
//! Measures pooled against unpooled SQLite connection handling under
//! bounded concurrency: the same statement is run a fixed number of times
//! through each strategy and the results are compared.

pub mod config;
pub mod harness;
pub mod report;
pub mod strategy;

pub use config::{BenchConfig, BenchError};
pub use harness::{preflight, run_benchmark, BenchReport, BenchmarkHarness};
pub use report::{compare, print_comparison, BenchResult, Comparison, LatencySummary};
pub use strategy::{ConnectionGauge, ConnectionStrategy, PooledStrategy, UnpooledStrategy};
