//! Key-to-shard routing.
//!
//! Keys are mapped with the Euclidean remainder, `key.rem_euclid(n)`, so the
//! result is always in `0..n` even for negative keys (`-1` maps to `n - 1`).
//! The mapping only depends on the key and the shard count; changing the
//! shard count invalidates every stored placement.

use crate::types::{ShardId, UserId};

/// Compute the index of the shard owning `key` among `shard_count` shards.
///
/// # Panics
///
/// Panics if `shard_count` is 0.
pub fn shard_index(key: UserId, shard_count: u32) -> u32 {
    assert!(shard_count > 0, "Number of shards must be greater than 0");
    // rem_euclid of an i64 by a positive divisor is in 0..divisor.
    key.rem_euclid(i64::from(shard_count)) as u32
}

/// Modulo router over a fixed number of shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuloRouter {
    shard_count: u32,
}

impl ModuloRouter {
    /// Create a router over `shard_count` shards.
    ///
    /// # Panics
    ///
    /// Panics if `shard_count` is 0.
    pub fn new(shard_count: u32) -> Self {
        assert!(shard_count > 0, "Number of shards must be greater than 0");
        Self { shard_count }
    }

    /// The shard owning `key`.
    pub fn shard_for(&self, key: UserId) -> ShardId {
        ShardId::new(shard_index(key, self.shard_count))
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// All shard IDs in index order.
    pub fn all_shards(&self) -> Vec<ShardId> {
        (0..self.shard_count).map(ShardId::new).collect()
    }
}
