//! End-to-end benchmark runs against a throwaway SQLite file.

use shardline_bench::*;
use std::sync::Arc;
use tempfile::TempDir;

fn small_config(dir: &TempDir) -> BenchConfig {
    BenchConfig::new(dir.path().join("bench.db"))
        .with_pool_size(3)
        .with_concurrency(16)
        .with_operations(120)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pooled_run_stays_within_pool() {
    let dir = TempDir::new().unwrap();
    let config = small_config(&dir);
    preflight(&config).await.unwrap();

    let strategy =
        Arc::new(PooledStrategy::open(config.database.clone(), config.pool_size).unwrap());
    let result = run_benchmark(strategy.clone(), &config).await;

    assert_eq!(result.successful + result.errors, config.operations);
    assert_eq!(result.errors, 0);
    assert!(result.peak_connections >= 1);
    assert!(result.peak_connections <= config.pool_size);
    assert_eq!(strategy.pool().size(), config.pool_size);
    assert_eq!(strategy.pool().connections(), config.pool_size);
    assert_eq!(strategy.pool().idle(), config.pool_size);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unpooled_run_counts_every_operation() {
    let dir = TempDir::new().unwrap();
    let config = small_config(&dir);
    preflight(&config).await.unwrap();

    let strategy = Arc::new(UnpooledStrategy::new(config.database.clone()));
    let result = run_benchmark(strategy, &config).await;

    assert_eq!(result.total(), config.operations);
    assert_eq!(result.description, "Non-pooled connections");
    assert!(result.peak_connections <= config.concurrency);
}

#[tokio::test]
async fn test_failing_query_is_counted_as_errors() {
    let dir = TempDir::new().unwrap();
    let config = small_config(&dir)
        .with_operations(20)
        .with_query("SELECT * FROM no_such_table");

    let strategy = Arc::new(PooledStrategy::open(config.database.clone(), 2).unwrap());
    let result = run_benchmark(strategy, &config).await;

    assert_eq!(result.successful, 0);
    assert_eq!(result.errors, 20);
    assert_eq!(result.avg_per_op(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_harness_full_run() {
    let dir = TempDir::new().unwrap();
    let harness = BenchmarkHarness::new(small_config(&dir).with_operations(60)).unwrap();

    let report = harness.run_all().await.unwrap();
    assert_eq!(report.non_pooled.total(), 60);
    assert_eq!(report.pooled.total(), 60);
    assert_eq!(report.pooled.description, "Pooled connections");
    assert!(report.pooled.peak_connections <= 3);
    assert!(report.comparison.is_some());

    let csv = report.to_csv();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.starts_with(BenchResult::csv_header()));
}

#[tokio::test]
async fn test_harness_aborts_on_failed_preflight() {
    let dir = TempDir::new().unwrap();
    let config = BenchConfig::new(dir.path().join("missing/bench.db")).with_operations(5);
    let harness = BenchmarkHarness::new(config).unwrap();

    assert!(matches!(
        harness.run_all().await,
        Err(BenchError::Preflight(_))
    ));
}
