//! SQLite-backed shard.
//!
//! Each shard is one database file holding a `users` table. Access goes
//! through a `SqlitePool`, so many requests can use the shard at once.

use crate::pool::SqlitePool;
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use shardline_core::{NewUser, ShardBackend, ShardScan, StoreError, StoreResult, User, UserId};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
"#;

const SELECT_ONE: &str = "SELECT user_id, name, email, created_at FROM users WHERE user_id = ?1";
const SELECT_ALL: &str = "SELECT user_id, name, email, created_at FROM users ORDER BY user_id";
const INSERT: &str =
    "INSERT INTO users (user_id, name, email) VALUES (?1, ?2, ?3) RETURNING created_at";

/// Create the `users` table if it does not exist yet.
pub fn create_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA).map_err(map_sql_error)
}

/// Translate a rusqlite error into the backend taxonomy.
pub(crate) fn map_sql_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::ConstraintViolation => StoreError::Constraint(err.to_string()),
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseCorrupt => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        },
        _ => StoreError::Query(err.to_string()),
    }
}

fn decode_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Scan every row, keeping the ones that decode and collecting the errors of
/// the ones that do not.
fn scan_users(conn: &Connection) -> StoreResult<ShardScan> {
    let mut stmt = conn.prepare_cached(SELECT_ALL).map_err(map_sql_error)?;
    let mut rows = stmt.query([]).map_err(map_sql_error)?;

    let mut scan = ShardScan::default();
    while let Some(row) = rows.next().map_err(map_sql_error)? {
        match decode_user(row) {
            Ok(user) => scan.users.push(user),
            Err(e) => {
                let key: Option<i64> = row.get(0).ok();
                scan.row_errors.push(match key {
                    Some(key) => format!("user {}: {}", key, e),
                    None => e.to_string(),
                });
            }
        }
    }
    Ok(scan)
}

/// Pooled connections per SQLite shard when the descriptor names none.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// A shard stored in a SQLite database file.
pub struct SqliteShard {
    path: PathBuf,
    pool: SqlitePool,
}

impl SqliteShard {
    /// Open (or create) the shard database with `pool_size` connections.
    ///
    /// This blocks on file I/O; call it from a blocking context.
    pub fn open(path: impl Into<PathBuf>, pool_size: usize) -> StoreResult<Self> {
        let path = path.into();
        let pool = SqlitePool::open(path.clone(), pool_size, create_schema)?;
        debug!("Opened SQLite shard at {}", path.display());
        Ok(Self { path, pool })
    }

    /// The database file backing this shard.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The connection pool used by this shard.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Take the shard offline: every later call fails with `Unavailable`.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl ShardBackend for SqliteShard {
    fn describe(&self) -> String {
        format!("sqlite:{} (pool {})", self.path.display(), self.pool.size())
    }

    async fn point_query(&self, key: UserId) -> StoreResult<Option<User>> {
        self.pool
            .run(move |conn| {
                let mut stmt = conn.prepare_cached(SELECT_ONE).map_err(map_sql_error)?;
                stmt.query_row(params![key], decode_user)
                    .optional()
                    .map_err(map_sql_error)
            })
            .await
    }

    async fn insert(&self, user: &NewUser) -> StoreResult<User> {
        let user = user.clone();
        self.pool
            .run(move |conn| {
                let mut stmt = conn.prepare_cached(INSERT).map_err(map_sql_error)?;
                let created_at: String = stmt
                    .query_row(params![user.user_id, user.name, user.email], |row| row.get(0))
                    .map_err(map_sql_error)?;
                Ok(user.into_user(created_at))
            })
            .await
    }

    async fn query_all(&self) -> StoreResult<ShardScan> {
        let scan = self.pool.run(scan_users).await?;
        if !scan.row_errors.is_empty() {
            warn!(
                "{} row(s) in {} could not be decoded",
                scan.row_errors.len(),
                self.path.display()
            );
        }
        Ok(scan)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.pool
            .run(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map(|_| ())
                    .map_err(map_sql_error)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_shard(dir: &TempDir) -> SqliteShard {
        SqliteShard::open(dir.path().join("shard.db"), 2).unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_point_query() {
        let dir = TempDir::new().unwrap();
        let shard = open_shard(&dir);

        let created = shard
            .insert(&NewUser::new(3, "Grace", "grace@example.com"))
            .await
            .unwrap();
        assert_eq!(created.user_id, 3);
        assert!(!created.created_at.is_empty());

        let fetched = shard.point_query(3).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_point_query_miss() {
        let dir = TempDir::new().unwrap();
        let shard = open_shard(&dir);
        assert_eq!(shard.point_query(99).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_constraint_violation() {
        let dir = TempDir::new().unwrap();
        let shard = open_shard(&dir);

        let original = shard
            .insert(&NewUser::new(1, "Alan", "alan@example.com"))
            .await
            .unwrap();
        let result = shard.insert(&NewUser::new(1, "Other", "other@example.com")).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));

        // The original row is untouched.
        assert_eq!(shard.point_query(1).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn test_query_all_ordered_by_key() {
        let dir = TempDir::new().unwrap();
        let shard = open_shard(&dir);
        for key in [5, 1, 3] {
            shard
                .insert(&NewUser::new(key, format!("u{}", key), format!("u{}@x", key)))
                .await
                .unwrap();
        }

        let scan = shard.query_all().await.unwrap();
        let keys: Vec<_> = scan.users.iter().map(|u| u.user_id).collect();
        assert_eq!(keys, vec![1, 3, 5]);
        assert!(scan.row_errors.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_row_is_reported() {
        let dir = TempDir::new().unwrap();
        let shard = open_shard(&dir);
        shard.insert(&NewUser::new(1, "ok", "ok@x")).await.unwrap();

        // A BLOB keeps its storage class in a TEXT column and fails to decode as String.
        let raw = Connection::open(shard.path()).unwrap();
        raw.execute(
            "INSERT INTO users (user_id, name, email) VALUES (2, X'FF00', 'bad@x')",
            [],
        )
        .unwrap();

        let scan = shard.query_all().await.unwrap();
        assert_eq!(scan.users.len(), 1);
        assert_eq!(scan.users[0].user_id, 1);
        assert_eq!(scan.row_errors.len(), 1);
        assert!(scan.row_errors[0].starts_with("user 2:"));
    }

    #[tokio::test]
    async fn test_closed_shard_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let shard = open_shard(&dir);
        assert!(shard.health_check().await.is_ok());

        shard.close();
        assert!(matches!(
            shard.health_check().await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            shard.point_query(1).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        {
            let shard = open_shard(&dir);
            shard.insert(&NewUser::new(8, "kept", "kept@x")).await.unwrap();
        }
        let shard = open_shard(&dir);
        assert_eq!(shard.point_query(8).await.unwrap().unwrap().name, "kept");
    }
}
