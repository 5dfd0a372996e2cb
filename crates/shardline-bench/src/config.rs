//! Benchmark configuration and errors.

use shardline_core::StoreError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that stop a benchmark before it produces a result.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid benchmark config: {0}")]
    InvalidConfig(String),

    #[error("database preflight failed: {0}")]
    Preflight(#[source] StoreError),

    #[error("failed to build connection pool: {0}")]
    Pool(#[source] StoreError),
}

/// Configuration for benchmark runs.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// SQLite database file the operations run against.
    pub database: PathBuf,
    /// Connections held by the pooled strategy.
    pub pool_size: usize,
    /// Maximum operations in flight at once.
    pub concurrency: usize,
    /// Total operations per strategy.
    pub operations: usize,
    /// Statement executed by every operation.
    pub query: String,
    /// Upper bound on a single operation.
    pub op_timeout: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("bench.db"),
            pool_size: 10,
            concurrency: 200,
            operations: 5000,
            query: "SELECT 1".to_string(),
            op_timeout: Duration::from_secs(5),
        }
    }
}

impl BenchConfig {
    /// Create a configuration for `database` with default settings.
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_operations(mut self, operations: usize) -> Self {
        self.operations = operations;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Reject settings the harness cannot run with.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.pool_size == 0 {
            return Err(BenchError::InvalidConfig(
                "pool_size must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(BenchError::InvalidConfig(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.op_timeout.is_zero() {
            return Err(BenchError::InvalidConfig(
                "op_timeout must be greater than 0".to_string(),
            ));
        }
        if self.query.trim().is_empty() {
            return Err(BenchError::InvalidConfig("query must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.concurrency, 200);
        assert_eq!(config.operations, 5000);
        assert_eq!(config.query, "SELECT 1");
        assert_eq!(config.op_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BenchConfig::new("x.db")
            .with_pool_size(2)
            .with_concurrency(8)
            .with_operations(50);
        assert_eq!(config.database, PathBuf::from("x.db"));
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.operations, 50);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(BenchConfig::default().with_pool_size(0).validate().is_err());
        assert!(BenchConfig::default().with_concurrency(0).validate().is_err());
        assert!(BenchConfig::default()
            .with_op_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(BenchConfig::default().with_query("  ").validate().is_err());
    }
}
