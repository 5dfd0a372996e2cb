//! SQLite connection pool.
//!
//! A thin wrapper over an `r2d2` pool of `r2d2_sqlite` connections. Every
//! connection is opened up front and configured by `SqlitePragmas` when it
//! is created. Checkout happens on the blocking thread pool, so a task
//! waiting for a free connection never stalls the async runtime.

use r2d2::CustomizeConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use shardline_core::{StoreError, StoreResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a checkout waits for a free pooled connection.
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

fn open_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

/// Busy timeout plus WAL journaling, applied to every connection.
fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
}

/// Open a single configured connection to a SQLite database file.
///
/// Enables WAL mode and a busy timeout so that pooled connections can read
/// concurrently while a writer holds the lock.
pub fn open_connection(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open_with_flags(path, open_flags()).map_err(|e| {
        StoreError::Unavailable(format!("cannot open {}: {}", path.display(), e))
    })?;
    configure(&conn).map_err(|e| {
        StoreError::Unavailable(format!("cannot configure {}: {}", path.display(), e))
    })?;
    Ok(conn)
}

/// Applies the connection pragmas as the pool creates connections.
#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<Connection, rusqlite::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        configure(conn)
    }
}

/// A pool of SQLite connections to one database file.
///
/// # Thread Safety
///
/// The pool is `Clone` (shared internals) and safe to use from many tasks at
/// once; at most `size()` operations run concurrently, the rest wait for a
/// connection to come back.
#[derive(Clone)]
pub struct SqlitePool {
    pool: r2d2::Pool<SqliteConnectionManager>,
    path: Arc<PathBuf>,
    closed: Arc<AtomicBool>,
}

impl SqlitePool {
    /// Open a pool of `size` connections, running `init` first.
    ///
    /// `init` gets a standalone connection and is where callers create their
    /// schema; the pool connections are opened after it returns.
    pub fn open<F>(path: impl Into<PathBuf>, size: usize, init: F) -> StoreResult<Self>
    where
        F: FnOnce(&Connection) -> StoreResult<()>,
    {
        let path = path.into();
        let max_size = u32::try_from(size)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| StoreError::Unavailable(format!("invalid pool size {}", size)))?;

        // Fails fast on an unreachable path instead of waiting out the
        // pool's connection timeout.
        init(&open_connection(&path)?)?;

        let manager = SqliteConnectionManager::file(&path).with_flags(open_flags());
        let pool = r2d2::Pool::builder()
            .max_size(max_size)
            .min_idle(Some(max_size))
            .connection_timeout(CHECKOUT_TIMEOUT)
            .connection_customizer(Box::new(SqlitePragmas))
            .build(manager)
            .map_err(|e| {
                let reason = format!("cannot build pool for {}: {}", path.display(), e);
                StoreError::Unavailable(reason)
            })?;
        debug!("Opened pool of {} connection(s) to {}", size, path.display());

        Ok(Self {
            pool,
            path: Arc::new(path),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    ///
    /// Waits for a free connection first. Fails with `Unavailable` once the
    /// pool has been closed or when no connection frees up in time.
    pub async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        if self.is_closed() {
            return Err(StoreError::Unavailable(format!(
                "pool for {} is closed",
                self.path.display()
            )));
        }

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| {
                StoreError::Unavailable(format!("no connection available: {}", e))
            })?;
            f(&*conn)
        })
        .await
        .map_err(|e| StoreError::Query(format!("blocking task failed: {}", e)))?
    }

    /// Stop handing out connections. In-flight operations finish normally.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        debug!("Closed pool for {}", self.path.display());
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Maximum number of connections the pool holds.
    pub fn size(&self) -> usize {
        self.pool.max_size() as usize
    }

    /// Connections currently open, idle or checked out.
    pub fn connections(&self) -> usize {
        self.pool.state().connections as usize
    }

    /// Number of connections currently idle.
    pub fn idle(&self) -> usize {
        self.pool.state().idle_connections as usize
    }

    /// The database file this pool connects to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
