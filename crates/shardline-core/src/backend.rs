//! Per-shard capability traits.
//!
//! The router only needs a small capability set from each shard: a point
//! lookup, an insert, a full scan and a liveness check. Anything that
//! provides them behind `ShardBackend` can serve as a shard.

use crate::error::StoreResult;
use crate::types::{NewUser, ShardScan, User, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// How to reach one shard.
///
/// Descriptors are listed in shard order; the position in the list is the
/// shard index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ShardDescriptor {
    /// A SQLite database file accessed through a connection pool.
    ///
    /// Without a `pool_size` the backend picks its own default.
    Sqlite {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pool_size: Option<usize>,
    },
    /// An in-process store, mostly for tests and demos.
    Memory,
}

impl ShardDescriptor {
    /// A SQLite descriptor that leaves the pool size to the backend.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        ShardDescriptor::Sqlite {
            path: path.into(),
            pool_size: None,
        }
    }

    /// A SQLite descriptor with an explicit pool size.
    pub fn sqlite_with_pool(path: impl Into<PathBuf>, pool_size: usize) -> Self {
        ShardDescriptor::Sqlite {
            path: path.into(),
            pool_size: Some(pool_size),
        }
    }
}

impl std::fmt::Display for ShardDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShardDescriptor::Sqlite { path, pool_size } => {
                write!(f, "sqlite:{}", path.display())?;
                match pool_size {
                    Some(size) => write!(f, " (pool {})", size),
                    None => Ok(()),
                }
            }
            ShardDescriptor::Memory => write!(f, "memory"),
        }
    }
}

/// One shard's storage backend.
///
/// Implementations must be safe for concurrent use by many in-flight
/// requests: either internally pooled or otherwise synchronized.
#[async_trait]
pub trait ShardBackend: Send + Sync {
    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;

    /// Look up a single user. `Ok(None)` means no matching row.
    async fn point_query(&self, key: UserId) -> StoreResult<Option<User>>;

    /// Insert a user and return it with the server-populated fields.
    ///
    /// A duplicate key must fail with `StoreError::Constraint` and leave the
    /// existing row untouched.
    async fn insert(&self, user: &NewUser) -> StoreResult<User>;

    /// Read every user on this shard, ordered by key.
    async fn query_all(&self) -> StoreResult<ShardScan>;

    /// Check that the shard is reachable and answering queries.
    async fn health_check(&self) -> StoreResult<()>;
}

/// Opens shard backends from descriptors.
#[async_trait]
pub trait ShardConnector: Send + Sync {
    async fn connect(&self, descriptor: &ShardDescriptor) -> StoreResult<Arc<dyn ShardBackend>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_descriptor_leaves_pool_unset() {
        let desc = ShardDescriptor::sqlite("/tmp/shard0.db");
        assert_eq!(
            desc,
            ShardDescriptor::Sqlite {
                path: PathBuf::from("/tmp/shard0.db"),
                pool_size: None
            }
        );
        assert_eq!(desc.to_string(), "sqlite:/tmp/shard0.db");

        let sized = ShardDescriptor::sqlite_with_pool("/tmp/shard0.db", 4);
        assert_eq!(sized.to_string(), "sqlite:/tmp/shard0.db (pool 4)");
    }

    #[test]
    fn test_descriptor_json_tagging() {
        let desc: ShardDescriptor =
            serde_json::from_str(r#"{"backend":"sqlite","path":"a.db"}"#).unwrap();
        assert_eq!(desc, ShardDescriptor::sqlite("a.db"));
        assert_eq!(
            serde_json::to_string(&desc).unwrap(),
            r#"{"backend":"sqlite","path":"a.db"}"#
        );

        let sized: ShardDescriptor =
            serde_json::from_str(r#"{"backend":"sqlite","path":"a.db","pool_size":2}"#).unwrap();
        assert_eq!(sized, ShardDescriptor::sqlite_with_pool("a.db", 2));

        let mem: ShardDescriptor = serde_json::from_str(r#"{"backend":"memory"}"#).unwrap();
        assert_eq!(mem, ShardDescriptor::Memory);
    }
}
