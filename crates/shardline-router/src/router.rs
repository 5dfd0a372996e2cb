//! The shard router.
//!
//! `ShardRouter` owns a fixed, ordered set of shards and exposes:
//! - `get_user` / `create_user`: single-shard operations on the shard
//!   selected by `key mod N`
//! - `list_all_users`: a scatter-gather read over every shard that tolerates
//!   per-shard failures and reports them as a partial result
//!
//! The shard set is decided once at construction and never changes; no
//! operation retries, fails over, or compensates across shards.

use crate::config::{RouterConfig, RouterOptions};
use crate::connector::DefaultConnector;
use futures::future::join_all;
use shardline_core::*;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// One slot of the shard list.
#[derive(Clone)]
struct Shard {
    id: ShardId,
    backend: Arc<dyn ShardBackend>,
}

/// Rows and failures accumulated by the scatter tasks of one read.
#[derive(Default)]
struct GatherState {
    users: Vec<User>,
    failures: Vec<ShardFailure>,
}

impl GatherState {
    fn record(&mut self, shard: ShardId, outcome: Result<ShardScan, FailureKind>) {
        match outcome {
            Ok(scan) => {
                debug!("{} returned {} user(s)", shard, scan.users.len());
                if let Some(first) = scan.row_errors.first() {
                    warn!(
                        "{}: skipped {} undecodable row(s), first: {}",
                        shard,
                        scan.row_errors.len(),
                        first
                    );
                    self.failures.push(ShardFailure::new(
                        shard,
                        FailureKind::RowErrors {
                            skipped: scan.row_errors.len(),
                            first: first.clone(),
                        },
                    ));
                }
                self.users.extend(scan.users);
            }
            Err(kind) => {
                warn!("Excluding {} from scatter-gather: {}", shard, kind);
                self.failures.push(ShardFailure::new(shard, kind));
            }
        }
    }
}

/// Routes user operations to a fixed set of shards.
///
/// # Thread Safety
///
/// The router is `Clone` (the shard list is shared behind an `Arc`) and can
/// be used from many tasks at once. Concurrency control for each shard is
/// left to its backend.
///
/// # Example
///
/// ```rust,ignore
/// use shardline_router::{RouterConfig, ShardRouter};
///
/// let config = RouterConfig::load("shardline.toml".as_ref())?;
/// let router = ShardRouter::from_config(&config).await?;
///
/// let created = router.create_user(NewUser::new(3, "Ada", "ada@example.com")).await?;
/// assert_eq!(created.shard, router.shard_index_of(3));
///
/// let all = router.list_all_users().await?;
/// if let Some(partial) = &all.partial {
///     eprintln!("missing shards: {:?}", partial.failed_shards());
/// }
/// ```
#[derive(Clone)]
pub struct ShardRouter {
    shards: Arc<[Shard]>,
    routing: ModuloRouter,
    options: RouterOptions,
}

impl std::fmt::Debug for ShardRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardRouter")
            .field("shards", &self.describe_shards())
            .field("options", &self.options)
            .finish()
    }
}

impl ShardRouter {
    /// Connect to every shard in `descriptors`, in order, and verify each one.
    ///
    /// Fails with `RouterError::Configuration` naming the shard if any shard
    /// cannot be connected or fails its health check. No partially connected
    /// router is ever returned.
    pub async fn connect(
        descriptors: &[ShardDescriptor],
        connector: &dyn ShardConnector,
        options: RouterOptions,
    ) -> RouterResult<Self> {
        if descriptors.is_empty() {
            return Err(RouterError::configuration("at least one shard is required"));
        }

        let mut backends = Vec::with_capacity(descriptors.len());
        for (i, descriptor) in descriptors.iter().enumerate() {
            let shard = ShardId::new(i as u32);
            info!("Connecting {} to {}", shard, descriptor);
            let backend = connector.connect(descriptor).await.map_err(|e| {
                error!("Failed to connect {} ({}): {}", shard, descriptor, e);
                RouterError::Configuration {
                    shard: Some(shard),
                    reason: format!("failed to connect to {}: {}", descriptor, e),
                }
            })?;
            backends.push(backend);
        }

        Self::from_backends(backends, options).await
    }

    /// Build a router from a validated config, using the built-in backends.
    pub async fn from_config(config: &RouterConfig) -> RouterResult<Self> {
        config
            .validate()
            .map_err(|e| RouterError::configuration(e.to_string()))?;
        Self::connect(&config.shards, &DefaultConnector::new(), config.options()).await
    }

    /// Build a router over already opened backends, in shard order.
    ///
    /// Every backend must pass its health check.
    pub async fn from_backends(
        backends: Vec<Arc<dyn ShardBackend>>,
        options: RouterOptions,
    ) -> RouterResult<Self> {
        if backends.is_empty() {
            return Err(RouterError::configuration("at least one shard is required"));
        }
        if options.shard_timeout.is_zero() {
            return Err(RouterError::configuration("shard timeout must be greater than 0"));
        }
        let count = u32::try_from(backends.len()).map_err(|_| {
            RouterError::configuration(format!("too many shards: {}", backends.len()))
        })?;

        let shards: Arc<[Shard]> = backends
            .into_iter()
            .enumerate()
            .map(|(i, backend)| Shard {
                id: ShardId::new(i as u32),
                backend,
            })
            .collect();

        let timeout = options.shard_timeout;
        let checks = join_all(shards.iter().map(|shard| async move {
            tokio::time::timeout(timeout, shard.backend.health_check())
                .await
                .unwrap_or(Err(StoreError::Timeout))
        }))
        .await;
        for (shard, check) in shards.iter().zip(checks) {
            if let Err(e) = check {
                error!(
                    "{} ({}) failed its liveness check: {}",
                    shard.id,
                    shard.backend.describe(),
                    e
                );
                return Err(RouterError::Configuration {
                    shard: Some(shard.id),
                    reason: format!("liveness check failed: {}", e),
                });
            }
        }

        info!("Shard router ready with {} shard(s)", count);
        Ok(Self {
            shards,
            routing: ModuloRouter::new(count),
            options,
        })
    }

    /// Number of configured shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The shard that owns `key`.
    pub fn shard_index_of(&self, key: UserId) -> ShardId {
        let shard = self.routing.shard_for(key);
        debug!("Routing user {} to {}", key, shard);
        shard
    }

    /// The router's runtime options.
    pub fn options(&self) -> RouterOptions {
        self.options
    }

    /// Shard IDs with their backend descriptions, in shard order.
    pub fn describe_shards(&self) -> Vec<(ShardId, String)> {
        self.shards
            .iter()
            .map(|s| (s.id, s.backend.describe()))
            .collect()
    }

    fn route(&self, key: UserId) -> &Shard {
        &self.shards[self.shard_index_of(key).index()]
    }

    /// Look up a user on its owning shard.
    ///
    /// A miss is `RouterError::NotFound`; a failing shard is
    /// `RouterError::ShardUnavailable`. Nothing is retried.
    pub async fn get_user(&self, key: UserId) -> RouterResult<Routed<User>> {
        let shard = self.route(key);
        match shard.backend.point_query(key).await {
            Ok(Some(user)) => Ok(Routed::new(shard.id, user)),
            Ok(None) => {
                debug!("User {} not found on {}", key, shard.id);
                Err(RouterError::NotFound {
                    key,
                    shard: shard.id,
                })
            }
            Err(e) => {
                warn!("Lookup of user {} on {} failed: {}", key, shard.id, e);
                Err(RouterError::from_store(shard.id, e))
            }
        }
    }

    /// Insert a user on its owning shard and return it with `created_at` set.
    ///
    /// A duplicate key is `RouterError::ConstraintViolation`. The user is
    /// never placed on another shard.
    pub async fn create_user(&self, user: NewUser) -> RouterResult<Routed<User>> {
        if user.name.trim().is_empty() {
            return Err(RouterError::InvalidInput("name must not be empty".to_string()));
        }
        if user.email.trim().is_empty() {
            return Err(RouterError::InvalidInput("email must not be empty".to_string()));
        }

        let shard = self.route(user.user_id);
        match shard.backend.insert(&user).await {
            Ok(created) => {
                info!("Created user {} on {}", created.user_id, shard.id);
                Ok(Routed::new(shard.id, created))
            }
            Err(e) => {
                warn!("Insert of user {} on {} failed: {}", user.user_id, shard.id, e);
                Err(RouterError::from_store(shard.id, e))
            }
        }
    }

    /// Read every user from every shard.
    ///
    /// One task per shard runs concurrently under the per-shard timeout and
    /// appends to a shared accumulator; the call returns once every task has
    /// finished. Shards that fail are left out and listed in
    /// `Gathered::partial`. Only when every shard fails does the call itself
    /// fail, with `RouterError::AllShardsFailed`.
    pub async fn list_all_users(&self) -> RouterResult<Gathered<User>> {
        let state = Arc::new(Mutex::new(GatherState::default()));
        let timeout = self.options.shard_timeout;

        let tasks = self.shards.iter().map(|shard| {
            let shard = shard.clone();
            let state = Arc::clone(&state);
            let handle = tokio::spawn(async move {
                let outcome = match tokio::time::timeout(timeout, shard.backend.query_all()).await {
                    Ok(Ok(scan)) => Ok(scan),
                    Ok(Err(e)) => Err(FailureKind::Unavailable(e.to_string())),
                    Err(_) => Err(FailureKind::TimedOut),
                };
                state.lock().await.record(shard.id, outcome);
            });
            let id = shard.id;
            async move { (id, handle.await) }
        });

        for (id, joined) in join_all(tasks).await {
            if let Err(e) = joined {
                warn!("Scatter task for {} did not complete: {}", id, e);
                state
                    .lock()
                    .await
                    .record(id, Err(FailureKind::Aborted(e.to_string())));
            }
        }

        let GatherState {
            users,
            mut failures,
        } = std::mem::take(&mut *state.lock().await);
        failures.sort_by_key(|f| f.shard);

        let excluded = failures.iter().filter(|f| f.kind.excludes_shard()).count();
        if excluded == self.shards.len() {
            error!("Scatter-gather failed on all {} shard(s)", excluded);
            return Err(RouterError::AllShardsFailed { failures });
        }

        let gathered = Gathered::new(users, failures);
        if gathered.is_partial() {
            info!(
                "Gathered {} user(s) from {} shard(s), {} shard(s) excluded",
                gathered.count,
                self.shards.len() - excluded,
                excluded
            );
        } else {
            debug!(
                "Gathered {} user(s) from {} shard(s)",
                gathered.count,
                self.shards.len()
            );
        }
        Ok(gathered)
    }

    /// Check every shard concurrently and report its liveness.
    pub async fn health(&self) -> Vec<ShardHealth> {
        let timeout = self.options.shard_timeout;
        let checks = self.shards.iter().map(|shard| async move {
            match tokio::time::timeout(timeout, shard.backend.health_check()).await {
                Ok(Ok(())) => ShardHealth::healthy(shard.id),
                Ok(Err(e)) => ShardHealth::unhealthy(shard.id, e.to_string()),
                Err(_) => ShardHealth::unhealthy(shard.id, StoreError::Timeout.to_string()),
            }
        });
        join_all(checks).await
    }
}
