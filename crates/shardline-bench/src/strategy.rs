//! Connection strategies compared by the benchmark.
//!
//! - `UnpooledStrategy`: opens, uses and closes a fresh connection per
//!   operation
//! - `PooledStrategy`: borrows one of a fixed set of connections opened up
//!   front

use async_trait::async_trait;
use rusqlite::Connection;
use shardline_core::{StoreError, StoreResult};
use shardline_router::{open_connection, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A way of getting a connection to run one statement on.
#[async_trait]
pub trait ConnectionStrategy: Send + Sync {
    /// Human-readable name, used in reports.
    fn name(&self) -> &str;

    /// Run `query` once, draining any rows it returns.
    async fn execute(&self, query: &str) -> StoreResult<()>;

    /// Highest number of connections in use at the same time so far.
    fn peak_connections(&self) -> usize;
}

/// Run `query` on `conn`, stepping through every result row.
pub fn execute_query(conn: &Connection, query: &str) -> StoreResult<()> {
    let mut stmt = conn
        .prepare_cached(query)
        .map_err(|e| StoreError::Query(e.to_string()))?;
    let mut rows = stmt.query([]).map_err(|e| StoreError::Query(e.to_string()))?;
    while rows
        .next()
        .map_err(|e| StoreError::Query(e.to_string()))?
        .is_some()
    {}
    Ok(())
}

/// Tracks how many connections are in use and the highest value seen.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGauge {
    inner: Arc<GaugeInner>,
}

#[derive(Debug, Default)]
struct GaugeInner {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConnectionGauge {
    /// Count one connection as in use until the returned guard drops.
    pub fn enter(&self) -> GaugeGuard {
        let now = self.inner.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn current(&self) -> usize {
        self.inner.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

/// Held while a connection is in use.
pub struct GaugeGuard {
    inner: Arc<GaugeInner>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.inner.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Opens a new connection for every operation.
pub struct UnpooledStrategy {
    path: PathBuf,
    gauge: ConnectionGauge,
}

impl UnpooledStrategy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gauge: ConnectionGauge::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConnectionStrategy for UnpooledStrategy {
    fn name(&self) -> &str {
        "Non-pooled connections"
    }

    async fn execute(&self, query: &str) -> StoreResult<()> {
        let path = self.path.clone();
        let query = query.to_string();
        let gauge = self.gauge.clone();
        tokio::task::spawn_blocking(move || {
            let _open = gauge.enter();
            let conn = open_connection(&path)?;
            execute_query(&conn, &query)
        })
        .await
        .map_err(|e| StoreError::Query(format!("blocking task failed: {}", e)))?
    }

    fn peak_connections(&self) -> usize {
        self.gauge.peak()
    }
}

/// Runs every operation on a fixed-size `SqlitePool`.
pub struct PooledStrategy {
    pool: SqlitePool,
    gauge: ConnectionGauge,
}

impl PooledStrategy {
    /// Open a pool of `pool_size` connections to `path`.
    ///
    /// Opens every connection immediately; call it from a blocking context.
    pub fn open(path: impl Into<PathBuf>, pool_size: usize) -> StoreResult<Self> {
        let pool = SqlitePool::open(path, pool_size, |_| Ok(()))?;
        debug!("Pooled strategy ready with {} connection(s)", pool.size());
        Ok(Self {
            pool,
            gauge: ConnectionGauge::default(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionStrategy for PooledStrategy {
    fn name(&self) -> &str {
        "Pooled connections"
    }

    async fn execute(&self, query: &str) -> StoreResult<()> {
        let query = query.to_string();
        let gauge = self.gauge.clone();
        self.pool
            .run(move |conn| {
                let _in_use = gauge.enter();
                execute_query(conn, &query)
            })
            .await
    }

    fn peak_connections(&self) -> usize {
        self.gauge.peak()
    }
}
