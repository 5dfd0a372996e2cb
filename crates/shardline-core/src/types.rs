//! Core types shared by the router, the shard backends and the tooling.
//!
//! This module defines the entity stored on the shards (`User`), shard
//! identifiers, the routed/gathered result wrappers returned by the router,
//! and the failure records that make partial scatter-gather results visible.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity key of a user. Assigned by the caller, never by the router.
pub type UserId = i64;

/// Position of a shard in the ordered shard list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ShardId(pub u32);

impl ShardId {
    /// Create a new shard identifier.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the underlying shard number.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Get the shard number as a slice index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

/// A user record as stored on its owning shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identity key, immutable once assigned.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Creation timestamp populated by the shard (RFC 3339, UTC).
    pub created_at: String,
}

/// Insert payload for a new user. The shard fills in `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

impl NewUser {
    /// Create a new insert payload.
    pub fn new(user_id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            email: email.into(),
        }
    }

    /// Attach the server-populated fields, producing the stored record.
    pub fn into_user(self, created_at: impl Into<String>) -> User {
        User {
            user_id: self.user_id,
            name: self.name,
            email: self.email,
            created_at: created_at.into(),
        }
    }
}

/// A single-shard result tagged with the shard that served it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routed<T> {
    /// The shard the request was routed to.
    pub shard: ShardId,
    /// The value returned by that shard.
    pub value: T,
}

impl<T> Routed<T> {
    pub fn new(shard: ShardId, value: T) -> Self {
        Self { shard, value }
    }

    /// Drop the routing information.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Rows returned by a full scan of one shard.
///
/// `row_errors` holds one message per row that could not be decoded. Those
/// rows are absent from `users`; the remaining rows are still usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardScan {
    pub users: Vec<User>,
    pub row_errors: Vec<String>,
}

/// Why a shard was excluded from, or degraded in, a scatter-gather result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The shard's connection or query failed.
    Unavailable(String),
    /// The shard did not answer within the per-shard timeout.
    TimedOut,
    /// The task querying the shard panicked or was cancelled.
    Aborted(String),
    /// The shard answered, but some rows could not be decoded and were skipped.
    RowErrors { skipped: usize, first: String },
}

impl FailureKind {
    /// Whether the shard contributed no rows at all.
    pub fn excludes_shard(&self) -> bool {
        !matches!(self, FailureKind::RowErrors { .. })
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Unavailable(reason) => write!(f, "unavailable: {}", reason),
            FailureKind::TimedOut => write!(f, "timed out"),
            FailureKind::Aborted(reason) => write!(f, "aborted: {}", reason),
            FailureKind::RowErrors { skipped, first } => {
                write!(f, "{} row(s) skipped, first error: {}", skipped, first)
            }
        }
    }
}

/// A failure of one shard during a scatter-gather operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailure {
    pub shard: ShardId,
    pub kind: FailureKind,
}

impl ShardFailure {
    pub fn new(shard: ShardId, kind: FailureKind) -> Self {
        Self { shard, kind }
    }
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.shard, self.kind)
    }
}

/// Marker attached to a scatter-gather result when one or more shards were
/// excluded or degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResult {
    /// One entry per affected shard, sorted by shard.
    pub failures: Vec<ShardFailure>,
}

impl PartialResult {
    /// The shards named in this partial result.
    pub fn failed_shards(&self) -> Vec<ShardId> {
        self.failures.iter().map(|f| f.shard).collect()
    }

    /// Whether `shard` is named in this partial result.
    pub fn contains(&self, shard: ShardId) -> bool {
        self.failures.iter().any(|f| f.shard == shard)
    }
}

/// The merged outcome of a scatter-gather read.
///
/// Ordering across shards is unspecified; only the rows coming from one shard
/// keep that shard's local order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gathered<T> {
    pub items: Vec<T>,
    pub count: usize,
    /// `Some` when at least one shard was excluded or degraded.
    pub partial: Option<PartialResult>,
}

impl<T> Gathered<T> {
    /// Build a result, computing `count` from `items`.
    pub fn new(items: Vec<T>, failures: Vec<ShardFailure>) -> Self {
        let count = items.len();
        let partial = if failures.is_empty() {
            None
        } else {
            Some(PartialResult { failures })
        };
        Self {
            items,
            count,
            partial,
        }
    }

    /// Whether any shard was excluded or degraded.
    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }
}

/// Liveness of one shard as reported by the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardHealth {
    pub shard: ShardId,
    pub healthy: bool,
    /// The health check error, when unhealthy.
    pub error: Option<String>,
}

impl ShardHealth {
    /// Create a healthy shard status.
    pub fn healthy(shard: ShardId) -> Self {
        Self {
            shard,
            healthy: true,
            error: None,
        }
    }

    /// Create an unhealthy shard status.
    pub fn unhealthy(shard: ShardId, error: impl Into<String>) -> Self {
        Self {
            shard,
            healthy: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_id() {
        let shard = ShardId::new(3);
        assert_eq!(shard.as_u32(), 3);
        assert_eq!(shard.index(), 3);
        assert_eq!(format!("{}", shard), "shard-3");
    }

    #[test]
    fn test_new_user_into_user() {
        let user = NewUser::new(7, "Ada", "ada@example.com").into_user("2024-01-01T00:00:00Z");
        assert_eq!(user.user_id, 7);
        assert_eq!(user.name, "Ada");
        assert_eq!(user.created_at, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_user_json_field_names() {
        let user = NewUser::new(1, "a", "a@x").into_user("t");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["user_id"], 1);
        assert_eq!(json["created_at"], "t");
    }

    #[test]
    fn test_gathered_without_failures() {
        let gathered: Gathered<i32> = Gathered::new(vec![1, 2, 3], vec![]);
        assert_eq!(gathered.count, 3);
        assert!(!gathered.is_partial());
    }

    #[test]
    fn test_gathered_partial() {
        let failure = ShardFailure::new(ShardId::new(1), FailureKind::TimedOut);
        let gathered: Gathered<i32> = Gathered::new(vec![1], vec![failure]);
        assert!(gathered.is_partial());

        let partial = gathered.partial.unwrap();
        assert!(partial.contains(ShardId::new(1)));
        assert!(!partial.contains(ShardId::new(0)));
        assert_eq!(partial.failed_shards(), vec![ShardId::new(1)]);
    }

    #[test]
    fn test_failure_kind_excludes_shard() {
        assert!(FailureKind::TimedOut.excludes_shard());
        assert!(FailureKind::Unavailable("down".into()).excludes_shard());
        let rows = FailureKind::RowErrors {
            skipped: 2,
            first: "bad".into(),
        };
        assert!(!rows.excludes_shard());
        assert_eq!(rows.to_string(), "2 row(s) skipped, first error: bad");
    }

    #[test]
    fn test_shard_health() {
        assert!(ShardHealth::healthy(ShardId::new(0)).healthy);
        let down = ShardHealth::unhealthy(ShardId::new(1), "refused");
        assert!(!down.healthy);
        assert_eq!(down.error.as_deref(), Some("refused"));
    }
}
