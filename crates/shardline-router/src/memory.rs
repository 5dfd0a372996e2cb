//! In-process shard backend.
//!
//! `MemoryShard` keeps users in a `BTreeMap` and supports fault injection:
//! it can be switched offline, slowed down, or seeded with rows that fail to
//! decode. It also counts the calls it receives so callers can check which
//! shard served a request.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use shardline_core::{NewUser, ShardBackend, ShardScan, StoreError, StoreResult, User, UserId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum StoredRow {
    Valid(User),
    /// A row whose contents cannot be decoded; carries the decode error.
    Corrupt(String),
}

/// Number of calls a `MemoryShard` has received, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub point_queries: u64,
    pub inserts: u64,
    pub scans: u64,
    pub health_checks: u64,
}

impl CallCounts {
    /// Calls other than health checks.
    pub fn data_calls(&self) -> u64 {
        self.point_queries + self.inserts + self.scans
    }
}

#[derive(Default)]
struct Counters {
    point_queries: AtomicU64,
    inserts: AtomicU64,
    scans: AtomicU64,
    health_checks: AtomicU64,
}

/// An in-memory shard with fault injection.
pub struct MemoryShard {
    label: String,
    rows: RwLock<BTreeMap<UserId, StoredRow>>,
    available: AtomicBool,
    latency_ms: AtomicU64,
    counters: Counters,
}

impl MemoryShard {
    /// Create an empty, available shard.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            rows: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// Switch the shard on or off. While off, every call fails with
    /// `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Store a row that will fail to decode during scans.
    pub async fn insert_corrupt(&self, key: UserId, error: impl Into<String>) {
        let mut rows = self.rows.write().await;
        rows.insert(key, StoredRow::Corrupt(error.into()));
    }

    /// Number of rows stored, including corrupt ones.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Calls received so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            point_queries: self.counters.point_queries.load(Ordering::SeqCst),
            inserts: self.counters.inserts.load(Ordering::SeqCst),
            scans: self.counters.scans.load(Ordering::SeqCst),
            health_checks: self.counters.health_checks.load(Ordering::SeqCst),
        }
    }

    /// Apply the injected latency and availability.
    async fn enter(&self) -> StoreResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.is_available() {
            return Err(StoreError::Unavailable(format!("{} is offline", self.label)));
        }
        Ok(())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl ShardBackend for MemoryShard {
    fn describe(&self) -> String {
        format!("memory:{}", self.label)
    }

    async fn point_query(&self, key: UserId) -> StoreResult<Option<User>> {
        self.counters.point_queries.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;

        let rows = self.rows.read().await;
        match rows.get(&key) {
            Some(StoredRow::Valid(user)) => Ok(Some(user.clone())),
            Some(StoredRow::Corrupt(e)) => Err(StoreError::Query(format!("user {}: {}", key, e))),
            None => Ok(None),
        }
    }

    async fn insert(&self, user: &NewUser) -> StoreResult<User> {
        self.counters.inserts.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;

        let mut rows = self.rows.write().await;
        if rows.contains_key(&user.user_id) {
            return Err(StoreError::Constraint(format!(
                "duplicate key {} in {}",
                user.user_id, self.label
            )));
        }
        let stored = user.clone().into_user(now_rfc3339());
        rows.insert(user.user_id, StoredRow::Valid(stored.clone()));
        Ok(stored)
    }

    async fn query_all(&self) -> StoreResult<ShardScan> {
        self.counters.scans.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;

        let rows = self.rows.read().await;
        let mut scan = ShardScan::default();
        for (key, row) in rows.iter() {
            match row {
                StoredRow::Valid(user) => scan.users.push(user.clone()),
                StoredRow::Corrupt(e) => scan.row_errors.push(format!("user {}: {}", key, e)),
            }
        }
        Ok(scan)
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.counters.health_checks.fetch_add(1, Ordering::SeqCst);
        self.enter().await
    }
}
