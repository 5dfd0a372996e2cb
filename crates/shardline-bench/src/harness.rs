//! The benchmark driver.
//!
//! Every run spawns one task per operation; a semaphore with `concurrency`
//! permits bounds how many of them run at once. Outcomes are counted with
//! atomics and successful latencies are collected for the summary.

use crate::config::{BenchConfig, BenchError};
use crate::report::{compare, print_comparison, BenchResult, Comparison, LatencySummary};
use crate::strategy::{execute_query, ConnectionStrategy, PooledStrategy, UnpooledStrategy};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use shardline_core::StoreError;
use shardline_router::open_connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Check that the database can be opened and queried.
pub async fn preflight(config: &BenchConfig) -> Result<(), BenchError> {
    let path = config.database.clone();
    tokio::task::spawn_blocking(move || {
        let conn = open_connection(&path)?;
        execute_query(&conn, "SELECT 1")
    })
    .await
    .map_err(|e| {
        BenchError::Preflight(StoreError::Query(format!("preflight task failed: {}", e)))
    })?
    .map_err(BenchError::Preflight)?;
    info!("Database {} is reachable", config.database.display());
    Ok(())
}

/// Run `config.operations` operations through `strategy`.
///
/// Every operation is counted exactly once, as a success or an error;
/// timeouts and panicked tasks are errors.
pub async fn run_benchmark(
    strategy: Arc<dyn ConnectionStrategy>,
    config: &BenchConfig,
) -> BenchResult {
    run_with_progress(strategy, config, None).await
}

async fn run_with_progress(
    strategy: Arc<dyn ConnectionStrategy>,
    config: &BenchConfig,
    progress: Option<ProgressBar>,
) -> BenchResult {
    info!(
        "Running {} operation(s) with {} (concurrency {})",
        config.operations,
        strategy.name(),
        config.concurrency
    );

    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let successful = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let latencies = Arc::new(Mutex::new(Vec::with_capacity(config.operations)));
    let query: Arc<str> = Arc::from(config.query.as_str());
    let op_timeout = config.op_timeout;

    let start = Instant::now();
    let handles: Vec<_> = (0..config.operations)
        .map(|_| {
            let semaphore = Arc::clone(&semaphore);
            let strategy = Arc::clone(&strategy);
            let successful = Arc::clone(&successful);
            let errors = Arc::clone(&errors);
            let latencies = Arc::clone(&latencies);
            let query = Arc::clone(&query);
            let progress = progress.clone();
            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        errors.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                };

                let op_start = Instant::now();
                match tokio::time::timeout(op_timeout, strategy.execute(&query)).await {
                    Ok(Ok(())) => {
                        let elapsed = op_start.elapsed();
                        successful.fetch_add(1, Ordering::SeqCst);
                        latencies.lock().await.push(elapsed);
                    }
                    Ok(Err(e)) => {
                        debug!("Operation failed: {}", e);
                        errors.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(_) => {
                        debug!("Operation timed out after {:?}", op_timeout);
                        errors.fetch_add(1, Ordering::SeqCst);
                    }
                }

                if let Some(progress) = &progress {
                    progress.inc(1);
                }
            })
        })
        .collect();

    for joined in join_all(handles).await {
        if let Err(e) = joined {
            warn!("Benchmark task did not complete: {}", e);
            errors.fetch_add(1, Ordering::SeqCst);
        }
    }
    let duration = start.elapsed();

    if let Some(progress) = &progress {
        progress.finish_with_message("done");
    }

    let mut samples = std::mem::take(&mut *latencies.lock().await);
    let result = BenchResult {
        description: strategy.name().to_string(),
        duration,
        successful: successful.load(Ordering::SeqCst),
        errors: errors.load(Ordering::SeqCst),
        latency: LatencySummary::from_samples(&mut samples),
        peak_connections: strategy.peak_connections(),
    };
    info!(
        "{} finished in {:?}: {} ok, {} error(s)",
        result.description, result.duration, result.successful, result.errors
    );
    result
}

/// Results of a full unpooled-then-pooled run.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub non_pooled: BenchResult,
    pub pooled: BenchResult,
    pub comparison: Option<Comparison>,
}

impl BenchReport {
    /// Print both summaries and the comparison.
    pub fn print(&self) {
        println!("\n{}", "=".repeat(60));
        println!("BENCHMARK RESULTS");
        println!("{}", "=".repeat(60));
        self.non_pooled.print_summary();
        self.pooled.print_summary();
        if let Some(comparison) = &self.comparison {
            print_comparison(comparison);
        }
        println!("\n{}", "=".repeat(60));
    }

    /// CSV header plus one row per strategy.
    pub fn to_csv(&self) -> String {
        format!(
            "{}\n{}\n{}\n",
            BenchResult::csv_header(),
            self.non_pooled.to_csv_row(),
            self.pooled.to_csv_row()
        )
    }
}

/// Runs the pooled vs unpooled comparison for one configuration.
///
/// # Example
///
/// ```rust,ignore
/// let harness = BenchmarkHarness::new(BenchConfig::new("bench.db"))?;
/// let report = harness.run_all().await?;
/// report.print();
/// ```
#[derive(Debug, Clone)]
pub struct BenchmarkHarness {
    config: BenchConfig,
    show_progress: bool,
}

impl BenchmarkHarness {
    /// Create a harness; fails if the config is invalid.
    pub fn new(config: BenchConfig) -> Result<Self, BenchError> {
        config.validate()?;
        Ok(Self {
            config,
            show_progress: false,
        })
    }

    /// Show a progress bar while operations run.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub async fn preflight(&self) -> Result<(), BenchError> {
        preflight(&self.config).await
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(self.config.operations as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ops")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(pb)
    }

    /// Run with a new connection per operation.
    pub async fn run_unpooled(&self) -> BenchResult {
        let strategy: Arc<dyn ConnectionStrategy> =
            Arc::new(UnpooledStrategy::new(self.config.database.clone()));
        run_with_progress(strategy, &self.config, self.progress_bar()).await
    }

    /// Run on a pool of `pool_size` connections.
    pub async fn run_pooled(&self) -> Result<BenchResult, BenchError> {
        let path = self.config.database.clone();
        let pool_size = self.config.pool_size;
        let strategy = tokio::task::spawn_blocking(move || PooledStrategy::open(path, pool_size))
            .await
            .map_err(|e| {
                BenchError::Pool(StoreError::Unavailable(format!("pool task failed: {}", e)))
            })?
            .map_err(BenchError::Pool)?;
        let strategy: Arc<dyn ConnectionStrategy> = Arc::new(strategy);
        Ok(run_with_progress(strategy, &self.config, self.progress_bar()).await)
    }

    /// Preflight, then run both strategies and compare.
    pub async fn run_all(&self) -> Result<BenchReport, BenchError> {
        self.preflight().await?;
        self.run_comparison().await
    }

    /// Run unpooled and then pooled, and compare them.
    pub async fn run_comparison(&self) -> Result<BenchReport, BenchError> {
        let non_pooled = self.run_unpooled().await;
        let pooled = self.run_pooled().await?;
        let comparison = compare(&non_pooled, &pooled);
        Ok(BenchReport {
            non_pooled,
            pooled,
            comparison,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shardline_core::StoreResult;
    use std::time::Duration;
    use tempfile::TempDir;

    /// A strategy that fails every third call and sleeps on every fifth.
    struct Flaky {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionStrategy for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn execute(&self, _query: &str) -> StoreResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 5 == 4 {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            if n % 3 == 2 {
                return Err(StoreError::Query("boom".to_string()));
            }
            Ok(())
        }

        fn peak_connections(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_every_operation_is_counted() {
        let config = BenchConfig::new("unused.db")
            .with_operations(30)
            .with_concurrency(4)
            .with_op_timeout(Duration::from_millis(50));
        let strategy = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
        });

        let result = run_benchmark(strategy, &config).await;
        assert_eq!(result.total(), 30);
        assert!(result.errors >= 10);
        assert_eq!(result.description, "flaky");
    }

    #[tokio::test]
    async fn test_preflight_fails_on_unreachable_database() {
        let dir = TempDir::new().unwrap();
        let config = BenchConfig::new(dir.path().join("missing/bench.db"));
        assert!(matches!(
            preflight(&config).await,
            Err(BenchError::Preflight(_))
        ));
    }

    #[test]
    fn test_harness_rejects_invalid_config() {
        let result = BenchmarkHarness::new(BenchConfig::default().with_concurrency(0));
        assert!(matches!(result, Err(BenchError::InvalidConfig(_))));
    }
}
