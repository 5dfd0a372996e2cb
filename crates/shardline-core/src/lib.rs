//! # Shardline Core
//!
//! Types, error taxonomy and shard capability traits shared by the
//! shardline router, its storage backends and the benchmark tooling.

pub mod backend;
pub mod error;
pub mod routing;
pub mod types;

pub use backend::{ShardBackend, ShardConnector, ShardDescriptor};
pub use error::{RouterError, RouterResult, StoreError, StoreResult};
pub use routing::{shard_index, ModuloRouter};
pub use types::*;
