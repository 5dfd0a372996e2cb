//! Opens shard backends from descriptors.

use crate::memory::MemoryShard;
use crate::sqlite::{SqliteShard, DEFAULT_POOL_SIZE};
use async_trait::async_trait;
use shardline_core::{ShardBackend, ShardConnector, ShardDescriptor, StoreError, StoreResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Connector for the built-in backends.
///
/// SQLite shards are opened on the blocking thread pool. Each memory
/// descriptor yields a fresh, empty store.
#[derive(Debug, Default)]
pub struct DefaultConnector {
    memory_shards: AtomicU32,
}

impl DefaultConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShardConnector for DefaultConnector {
    async fn connect(&self, descriptor: &ShardDescriptor) -> StoreResult<Arc<dyn ShardBackend>> {
        debug!("Connecting to {}", descriptor);
        match descriptor {
            ShardDescriptor::Sqlite { path, pool_size } => {
                let path = path.clone();
                let pool_size = pool_size.unwrap_or(DEFAULT_POOL_SIZE);
                let shard = tokio::task::spawn_blocking(move || SqliteShard::open(path, pool_size))
                    .await
                    .map_err(|e| {
                        StoreError::Unavailable(format!("open task failed: {}", e))
                    })??;
                Ok(Arc::new(shard))
            }
            ShardDescriptor::Memory => {
                let n = self.memory_shards.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(MemoryShard::new(format!("mem-{}", n))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_memory() {
        let connector = DefaultConnector::new();
        let a = connector.connect(&ShardDescriptor::Memory).await.unwrap();
        let b = connector.connect(&ShardDescriptor::Memory).await.unwrap();
        assert_eq!(a.describe(), "memory:mem-0");
        assert_eq!(b.describe(), "memory:mem-1");
    }

    #[tokio::test]
    async fn test_connect_sqlite() {
        let dir = TempDir::new().unwrap();
        let connector = DefaultConnector::new();
        let shard = connector
            .connect(&ShardDescriptor::sqlite(dir.path().join("s.db")))
            .await
            .unwrap();
        assert!(shard.health_check().await.is_ok());
        assert!(shard.describe().ends_with(&format!("(pool {})", DEFAULT_POOL_SIZE)));
    }

    #[tokio::test]
    async fn test_connect_sqlite_with_pool_size() {
        let dir = TempDir::new().unwrap();
        let connector = DefaultConnector::new();
        let shard = connector
            .connect(&ShardDescriptor::sqlite_with_pool(dir.path().join("s.db"), 2))
            .await
            .unwrap();
        assert!(shard.describe().ends_with("(pool 2)"));
    }

    #[tokio::test]
    async fn test_connect_sqlite_unreachable() {
        let dir = TempDir::new().unwrap();
        let connector = DefaultConnector::new();
        let result = connector
            .connect(&ShardDescriptor::sqlite(dir.path().join("no/such/dir/s.db")))
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
