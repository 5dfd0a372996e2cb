//! # Shardline Router
//!
//! Routes user records across a fixed set of SQLite (or in-memory) shards by
//! `user_id mod N`. Point reads and writes touch exactly one shard; the
//! full listing scatters to every shard and returns whatever the healthy
//! shards produced, together with a report of the ones that failed.

pub mod config;
pub mod connector;
pub mod memory;
pub mod pool;
pub mod router;
pub mod sqlite;

pub use config::{ConfigError, RouterConfig, RouterOptions, RouterSection, CONFIG_FILE_NAME};
pub use connector::DefaultConnector;
pub use memory::{CallCounts, MemoryShard};
pub use pool::{open_connection, SqlitePool};
pub use router::ShardRouter;
pub use sqlite::{create_schema, SqliteShard, DEFAULT_POOL_SIZE};
