//! Cache-Aside Coordinator
//!
//! Binds the LRU cache, the connection pool and the backing store.
//!
//! - Reads try the cache first and only lease a connection on a miss.
//! - Creates and deletes always hit the store first, then update or
//!   invalidate the cache.
//!
//! Cache writes are fenced with per-key [`FillTicket`](crate::cache::FillTicket)s taken before the
//! store is touched: a cache update whose ticket went stale (another writer,
//! delete or fill of the same key got there first) is not applied, and for
//! creates the key is invalidated instead so the next read goes back to the
//! store. Concurrent
//! reads, writes and deletes of one key therefore never leave the cache
//! holding a value the store no longer has.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheSnapshot, LruCache};
use crate::error::{Result, ServiceError};
use crate::metrics::{Operation, Outcome, ServiceMetrics};
use crate::pool::{ConnectionPool, PoolError, PooledConnection};
use crate::store::{StoreError, StoreResult};

/// Where a read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Cache,
    Store,
}

/// Result of a successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found { value: String, source: ValueSource },
    NotFound,
}

// == Coordinator Config ==
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorConfig {
    /// Bound on waiting for a pooled connection; `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,
    /// Bound on each store call; `None` waits indefinitely
    pub store_timeout: Option<Duration>,
}

// == Coordinator ==
/// Stateless request orchestrator; cloning shares the cache, pool and metrics.
#[derive(Clone)]
pub struct Coordinator {
    cache: Arc<LruCache>,
    pool: ConnectionPool,
    config: CoordinatorConfig,
    metrics: Arc<ServiceMetrics>,
}

impl Coordinator {
    pub fn new(
        cache: Arc<LruCache>,
        pool: ConnectionPool,
        config: CoordinatorConfig,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            cache,
            pool,
            config,
            metrics,
        }
    }

    pub fn cache(&self) -> &LruCache {
        &self.cache
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    // == Create ==
    /// Writes `key` to the store, then caches it.
    ///
    /// On store failure the cache is left untouched.
    pub async fn create(&self, key: &str, value: &str) -> Result<()> {
        let started = Instant::now();
        let result = self.create_inner(key, value).await;
        let outcome = match &result {
            Ok(()) => Outcome::Ok,
            Err(failure) => failure.outcome(),
        };
        self.finish(Operation::Create, key, outcome, started);
        result.map_err(ServiceError::from)
    }

    async fn create_inner(&self, key: &str, value: &str) -> Attempt<()> {
        let ticket = self.cache.fill_ticket(key);

        let mut conn = self.lease().await?;
        let written = bounded(self.config.store_timeout, conn.put(key, value)).await;
        settle(&mut conn, &written);
        conn.release();
        written?;

        if !ticket.fill(value) {
            // Another create, delete or fill of this key overlapped ours, so
            // the store may hold either value.
            debug!(key, "Key changed during store write, invalidating");
            self.cache.remove(key);
        }
        Ok(())
    }

    // == Read ==
    /// Answers from the cache, falling back to the store on a miss.
    ///
    /// A store hit is cached; a store miss is not.
    pub async fn read(&self, key: &str) -> Result<ReadOutcome> {
        let started = Instant::now();
        let result = self.read_inner(key).await;
        let outcome = match &result {
            Ok(ReadOutcome::Found {
                source: ValueSource::Cache,
                ..
            }) => Outcome::CacheHit,
            Ok(ReadOutcome::Found { .. }) => Outcome::Ok,
            Ok(ReadOutcome::NotFound) => Outcome::NotFound,
            Err(failure) => failure.outcome(),
        };
        self.finish(Operation::Read, key, outcome, started);
        result.map_err(ServiceError::from)
    }

    async fn read_inner(&self, key: &str) -> Attempt<ReadOutcome> {
        if let Some(value) = self.cache.get(key) {
            return Ok(ReadOutcome::Found {
                value,
                source: ValueSource::Cache,
            });
        }

        let ticket = self.cache.fill_ticket(key);

        let mut conn = self.lease().await?;
        let fetched = bounded(self.config.store_timeout, conn.get(key)).await;
        settle(&mut conn, &fetched);
        conn.release();

        match fetched? {
            Some(value) => {
                if !ticket.fill(value.as_str()) {
                    debug!(key, "Key changed during store read, fill skipped");
                }
                Ok(ReadOutcome::Found {
                    value,
                    source: ValueSource::Store,
                })
            }
            None => Ok(ReadOutcome::NotFound),
        }
    }

    // == Delete ==
    /// Deletes `key` from the store, then invalidates it in the cache.
    ///
    /// On store failure the cache is left untouched.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let started = Instant::now();
        let result = self.delete_inner(key).await;
        let outcome = match &result {
            Ok(()) => Outcome::Ok,
            Err(failure) => failure.outcome(),
        };
        self.finish(Operation::Delete, key, outcome, started);
        result.map_err(ServiceError::from)
    }

    async fn delete_inner(&self, key: &str) -> Attempt<()> {
        let mut conn = self.lease().await?;
        let deleted = bounded(self.config.store_timeout, conn.delete(key)).await;
        settle(&mut conn, &deleted);
        conn.release();
        deleted?;

        self.cache.remove(key);
        Ok(())
    }

    // == Cache Status ==
    /// Read-only snapshot of the cache, MRU first.
    pub fn cache_status(&self) -> CacheSnapshot {
        self.cache.snapshot()
    }

    // == Helpers ==
    async fn lease(&self) -> std::result::Result<PooledConnection, PoolError> {
        match self.config.acquire_timeout {
            Some(timeout) => self.pool.acquire_timeout(timeout).await,
            None => self.pool.acquire().await,
        }
    }

    fn finish(&self, op: Operation, key: &str, outcome: Outcome, started: Instant) {
        let elapsed = started.elapsed();
        match outcome {
            Outcome::StoreFailure | Outcome::PoolExhausted => {
                warn!(?op, key, ?outcome, "Request failed")
            }
            Outcome::PoolTimeout => debug!(?op, key, "Request timed out waiting for a connection"),
            _ => debug!(?op, key, ?outcome, elapsed_us = elapsed.as_micros() as u64, "Request served"),
        }
        self.metrics.record(op, outcome, elapsed);
    }
}

// == Failures ==
/// Everything that can go wrong inside a coordinated request.
#[derive(Debug)]
enum Failure {
    Store(StoreError),
    Pool(PoolError),
}

type Attempt<T> = std::result::Result<T, Failure>;

impl Failure {
    fn outcome(&self) -> Outcome {
        match self {
            Failure::Store(_) => Outcome::StoreFailure,
            Failure::Pool(PoolError::Timeout(_)) => Outcome::PoolTimeout,
            Failure::Pool(_) => Outcome::PoolExhausted,
        }
    }
}

impl From<StoreError> for Failure {
    fn from(err: StoreError) -> Self {
        Failure::Store(err)
    }
}

impl From<PoolError> for Failure {
    fn from(err: PoolError) -> Self {
        Failure::Pool(err)
    }
}

impl From<Failure> for ServiceError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Store(err) => err.into(),
            Failure::Pool(err) => err.into(),
        }
    }
}

/// Runs a store call, bounded by `limit` when one is configured.
async fn bounded<T>(
    limit: Option<Duration>,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(StoreError::TimedOut(limit))),
        None => call.await,
    }
}

/// A call abandoned mid-flight leaves the connection in an unknown state.
fn settle<T>(conn: &mut PooledConnection, result: &StoreResult<T>) {
    if let Err(StoreError::TimedOut(_)) = result {
        conn.invalidate();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use crate::store::MemorySource;

    async fn coordinator_with(
        source: &MemorySource,
        capacity: usize,
        pool_size: usize,
        config: CoordinatorConfig,
    ) -> Coordinator {
        let pool = ConnectionPool::connect(source.clone(), PoolConfig::new(pool_size))
            .await
            .unwrap();
        Coordinator::new(
            Arc::new(LruCache::new(capacity)),
            pool,
            config,
            Arc::new(ServiceMetrics::new()),
        )
    }

    async fn setup(capacity: usize) -> (MemorySource, Coordinator) {
        let source = MemorySource::new();
        let coordinator = coordinator_with(&source, capacity, 2, CoordinatorConfig::default()).await;
        (source, coordinator)
    }

    fn found(value: &str, source: ValueSource) -> ReadOutcome {
        ReadOutcome::Found {
            value: value.to_string(),
            source,
        }
    }

    #[tokio::test]
    async fn test_read_after_create_hits_cache() {
        let (source, coord) = setup(10).await;

        coord.create("k", "v").await.unwrap();
        let gets_before = source.counters().gets;

        assert_eq!(coord.read("k").await.unwrap(), found("v", ValueSource::Cache));
        assert_eq!(source.counters().gets, gets_before);
        assert_eq!(source.peek("k"), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_cache_hit_leases_nothing() {
        let source = MemorySource::new();
        let coord = coordinator_with(&source, 10, 1, CoordinatorConfig::default()).await;
        coord.create("k", "v").await.unwrap();

        let _held = coord.pool().acquire().await.unwrap();
        assert_eq!(coord.read("k").await.unwrap(), found("v", ValueSource::Cache));
    }

    #[tokio::test]
    async fn test_read_miss_fills_from_store() {
        let (source, coord) = setup(10).await;
        source.seed("k", "stored");

        assert_eq!(coord.read("k").await.unwrap(), found("stored", ValueSource::Store));
        assert_eq!(coord.read("k").await.unwrap(), found("stored", ValueSource::Cache));
        assert_eq!(source.counters().gets, 1);
    }

    #[tokio::test]
    async fn test_store_miss_is_not_cached() {
        let (source, coord) = setup(10).await;

        assert_eq!(coord.read("nope").await.unwrap(), ReadOutcome::NotFound);
        assert_eq!(coord.read("nope").await.unwrap(), ReadOutcome::NotFound);
        assert!(coord.cache_status().items.is_empty());
        assert_eq!(source.counters().gets, 2);
    }

    #[tokio::test]
    async fn test_read_after_delete_is_not_found() {
        let (source, coord) = setup(10).await;
        coord.create("k", "v").await.unwrap();
        coord.delete("k").await.unwrap();

        assert_eq!(coord.read("k").await.unwrap(), ReadOutcome::NotFound);
        assert_eq!(source.peek("k"), None);
        assert_eq!(source.counters().gets, 1);
    }

    #[tokio::test]
    async fn test_last_create_wins() {
        let (_source, coord) = setup(10).await;
        coord.create("k", "v1").await.unwrap();
        coord.create("k", "v2").await.unwrap();

        assert_eq!(coord.read("k").await.unwrap(), found("v2", ValueSource::Cache));
    }

    #[tokio::test]
    async fn test_create_store_failure_leaves_cache() {
        let (source, coord) = setup(10).await;
        coord.create("k", "old").await.unwrap();
        source.set_fail_writes(true);

        let result = coord.create("k", "new").await;
        assert!(matches!(result, Err(ServiceError::StoreFailure(_))));
        assert_eq!(coord.read("k").await.unwrap(), found("old", ValueSource::Cache));
        assert_eq!(coord.pool().status().available, 2);
    }

    #[tokio::test]
    async fn test_delete_store_failure_leaves_cache() {
        let (source, coord) = setup(10).await;
        coord.create("k", "v").await.unwrap();
        source.set_fail_writes(true);

        assert!(matches!(coord.delete("k").await, Err(ServiceError::StoreFailure(_))));
        assert_eq!(coord.cache_status().keys(), vec!["k"]);
    }

    #[tokio::test]
    async fn test_read_store_failure_is_not_masked() {
        let (source, coord) = setup(10).await;
        source.seed("k", "v");
        source.set_fail_reads(true);

        assert!(matches!(coord.read("k").await, Err(ServiceError::StoreFailure(_))));
        assert!(coord.cache_status().items.is_empty());
    }

    #[tokio::test]
    async fn test_pool_timeout_is_distinct() {
        let source = MemorySource::new();
        let config = CoordinatorConfig {
            acquire_timeout: Some(Duration::from_millis(20)),
            store_timeout: None,
        };
        let coord = coordinator_with(&source, 10, 1, config).await;

        let _held = coord.pool().acquire().await.unwrap();
        let result = coord.read("k").await;
        assert!(matches!(result, Err(ServiceError::PoolTimeout(_))));
        assert_eq!(coord.metrics().snapshot().read.pool_timeouts, 1);
    }

    #[tokio::test]
    async fn test_store_timeout_invalidates_connection() {
        let source = MemorySource::new();
        let config = CoordinatorConfig {
            acquire_timeout: None,
            store_timeout: Some(Duration::from_millis(20)),
        };
        let coord = coordinator_with(&source, 10, 1, config).await;
        source.set_latency(Some(Duration::from_millis(500)));

        let result = coord.read("k").await;
        assert!(matches!(result, Err(ServiceError::StoreFailure(msg)) if msg.contains("timed out")));

        source.set_latency(None);
        assert_eq!(coord.read("k").await.unwrap(), ReadOutcome::NotFound);
        assert_eq!(source.counters().resets, 1);
    }

    #[tokio::test]
    async fn test_end_to_end_eviction_scenario() {
        let (source, coord) = setup(2).await;

        coord.create("A", "1").await.unwrap();
        coord.create("B", "2").await.unwrap();
        assert_eq!(coord.cache_status().keys(), vec!["B", "A"]);

        coord.create("C", "3").await.unwrap();
        assert_eq!(coord.cache_status().keys(), vec!["C", "B"]);

        // A is still in the store, so the miss path refills it and evicts B
        assert_eq!(source.counters().gets, 0);
        assert_eq!(coord.read("A").await.unwrap(), found("1", ValueSource::Store));
        assert_eq!(source.counters().gets, 1);

        let status = coord.cache_status();
        assert_eq!(status.keys(), vec!["A", "C"]);
        assert_eq!(status.occupied, 2);
        assert_eq!(status.capacity, 2);
    }

    #[tokio::test]
    async fn test_delete_cached_key_goes_to_store() {
        let (source, coord) = setup(4).await;
        coord.create("B", "2").await.unwrap();
        coord.delete("B").await.unwrap();

        let gets_before = source.counters().gets;
        assert_eq!(coord.read("B").await.unwrap(), ReadOutcome::NotFound);
        assert_eq!(source.counters().gets, gets_before + 1);
    }

    #[tokio::test]
    async fn test_delete_racing_read_miss_leaves_no_stale_entry() {
        let source = MemorySource::new();
        let coord = coordinator_with(&source, 4, 2, CoordinatorConfig::default()).await;
        source.seed("k", "stale");
        source.set_latency(Some(Duration::from_millis(100)));

        let reader = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.read("k").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The read has taken its ticket and is still inside the store
        let deleter = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.delete("k").await })
        };

        let _ = reader.await.unwrap();
        deleter.await.unwrap().unwrap();
        source.set_latency(None);

        assert!(coord.cache_status().items.is_empty());
        assert_eq!(coord.read("k").await.unwrap(), ReadOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_overlapping_creates_of_other_keys_still_cache() {
        let source = MemorySource::new();
        let coord = coordinator_with(&source, 256, 8, CoordinatorConfig::default()).await;
        source.set_latency(Some(Duration::from_millis(50)));

        let slow = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.create("user:1", "slow").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut others = vec![];
        for i in 0..100 {
            let coord = coord.clone();
            others.push(tokio::spawn(async move {
                coord.create(&format!("other:{}", i), "x").await
            }));
        }
        slow.await.unwrap().unwrap();
        for handle in others {
            handle.await.unwrap().unwrap();
        }
        source.set_latency(None);

        assert_eq!(coord.read("user:1").await.unwrap(), found("slow", ValueSource::Cache));
        for i in 0..100 {
            let key = format!("other:{}", i);
            assert_eq!(coord.read(&key).await.unwrap(), found("x", ValueSource::Cache));
        }
        assert_eq!(source.counters().gets, 0);
        assert_eq!(coord.cache().pending_fills(), 0);
    }

    #[tokio::test]
    async fn test_failed_requests_release_tickets() {
        let (source, coord) = setup(4).await;
        source.set_fail_writes(true);
        source.set_fail_reads(true);

        assert!(coord.create("k", "v").await.is_err());
        assert!(coord.read("k").await.is_err());
        assert_eq!(coord.cache().pending_fills(), 0);
    }

    #[test]
    fn test_failure_outcomes() {
        let cases = [
            (Failure::from(StoreError::Backend("x".into())), Outcome::StoreFailure),
            (Failure::from(StoreError::TimedOut(Duration::from_millis(5))), Outcome::StoreFailure),
            (Failure::from(PoolError::Timeout(Duration::from_millis(5))), Outcome::PoolTimeout),
            (Failure::from(PoolError::Exhausted), Outcome::PoolExhausted),
        ];
        for (failure, expected) in cases {
            assert_eq!(failure.outcome(), expected);
            assert!(!matches!(
                ServiceError::from(failure),
                ServiceError::InvalidRequest(_) | ServiceError::NotFound(_)
            ));
        }
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let (source, coord) = setup(4).await;
        source.seed("s", "1");

        coord.create("k", "v").await.unwrap();
        coord.read("k").await.unwrap();
        coord.read("s").await.unwrap();
        coord.read("missing").await.unwrap();
        coord.delete("k").await.unwrap();

        let snapshot = coord.metrics().snapshot();
        assert_eq!(snapshot.create.ok, 1);
        assert_eq!(snapshot.read.requests, 3);
        assert_eq!(snapshot.read.cache_hits, 1);
        assert_eq!(snapshot.read.ok, 1);
        assert_eq!(snapshot.read.not_found, 1);
        assert_eq!(snapshot.delete.ok, 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_pool() {
        let (source, coord) = setup(8).await;

        let mut handles = vec![];
        for t in 0..12 {
            let coord = coord.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..20 {
                    let key = format!("k{}", (t * 20 + i) % 30);
                    coord.create(&key, &format!("v{}", t)).await.unwrap();
                    let _ = coord.read(&key).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let status = coord.pool().status();
        assert_eq!(status.available, 2);
        assert_eq!(status.leased, 0);
        assert!(coord.cache_status().occupied <= 8);
        assert_eq!(source.len(), 30);
    }
}
