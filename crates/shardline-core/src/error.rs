//! Error types for shard access and routing.
//!
//! `StoreError` is what a single shard backend reports. `RouterError` is what
//! the router hands to its caller; every variant that stems from a shard names
//! the shard(s) at fault.

use crate::types::{ShardFailure, ShardId, UserId};
use thiserror::Error;

/// Errors reported by a single shard backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("shard unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("operation timed out")]
    Timeout,
}

/// Result type for shard backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the shard router.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Startup failure. The router is never built in this case.
    #[error("configuration error{}: {reason}", fmt_shard(.shard))]
    Configuration {
        shard: Option<ShardId>,
        reason: String,
    },

    #[error("user {key} not found on {shard}")]
    NotFound { key: UserId, shard: ShardId },

    #[error("{shard} unavailable: {reason}")]
    ShardUnavailable { shard: ShardId, reason: String },

    #[error("constraint violation on {shard}: {reason}")]
    ConstraintViolation { shard: ShardId, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("all {} shard(s) failed: {}", .failures.len(), fmt_failures(.failures))]
    AllShardsFailed { failures: Vec<ShardFailure> },
}

fn fmt_shard(shard: &Option<ShardId>) -> String {
    match shard {
        Some(shard) => format!(" on {}", shard),
        None => String::new(),
    }
}

fn fmt_failures(failures: &[ShardFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RouterError {
    /// Build a startup error that is not tied to a particular shard.
    pub fn configuration(reason: impl Into<String>) -> Self {
        RouterError::Configuration {
            shard: None,
            reason: reason.into(),
        }
    }

    /// Map a backend error from a single-shard operation.
    pub fn from_store(shard: ShardId, err: StoreError) -> Self {
        match err {
            StoreError::Constraint(reason) => RouterError::ConstraintViolation { shard, reason },
            other => RouterError::ShardUnavailable {
                shard,
                reason: other.to_string(),
            },
        }
    }

    /// The shard(s) this error is attributed to.
    pub fn shards(&self) -> Vec<ShardId> {
        match self {
            RouterError::Configuration { shard, .. } => shard.iter().copied().collect(),
            RouterError::NotFound { shard, .. }
            | RouterError::ShardUnavailable { shard, .. }
            | RouterError::ConstraintViolation { shard, .. } => vec![*shard],
            RouterError::InvalidInput(_) => Vec::new(),
            RouterError::AllShardsFailed { failures } => failures.iter().map(|f| f.shard).collect(),
        }
    }

    /// Whether this is an expected point-lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RouterError::NotFound { .. })
    }
}

/// Result type for router operations.
pub type RouterResult<T> = Result<T, RouterError>;
