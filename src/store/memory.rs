//! In-Memory Store
//!
//! A process-local table shared by every connection a [`MemorySource`] opens.
//! Besides serving development setups it counts store traffic and can inject
//! faults, which is what the pool and coordinator tests rely on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::{ConnectionSource, Store, StoreError, StoreResult};

// == Counters ==
/// Point-in-time copy of the traffic a [`MemorySource`] has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    pub opens: u64,
    pub resets: u64,
    pub puts: u64,
    pub gets: u64,
    pub deletes: u64,
}

#[derive(Debug, Default)]
struct Shared {
    table: RwLock<HashMap<String, String>>,
    opens: AtomicU64,
    resets: AtomicU64,
    puts: AtomicU64,
    gets: AtomicU64,
    deletes: AtomicU64,
    // Fault switches
    failing_opens: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_resets: AtomicBool,
    unhealthy: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl Shared {
    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

// == Memory Source ==
/// Connection source backed by a shared in-memory table.
///
/// Cloning the source shares the table, counters and fault switches.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    shared: Arc<Shared>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a row directly into the table without counting it as traffic.
    pub fn seed(&self, key: impl Into<String>, value: impl Into<String>) {
        self.shared.table.write().insert(key.into(), value.into());
    }

    /// Reads a row directly from the table without counting it as traffic.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.shared.table.read().get(key).cloned()
    }

    /// Number of rows in the table.
    pub fn len(&self) -> usize {
        self.shared.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.table.read().is_empty()
    }

    /// Returns the traffic counters.
    pub fn counters(&self) -> MemoryCounters {
        let s = &self.shared;
        MemoryCounters {
            opens: s.opens.load(Ordering::Relaxed),
            resets: s.resets.load(Ordering::Relaxed),
            puts: s.puts.load(Ordering::Relaxed),
            gets: s.gets.load(Ordering::Relaxed),
            deletes: s.deletes.load(Ordering::Relaxed),
        }
    }

    // == Fault Injection ==
    /// Makes the next `count` calls to `open` fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.shared.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Makes every `get` fail while set.
    pub fn set_fail_reads(&self, fail: bool) {
        self.shared.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every `put` and `delete` fail while set.
    pub fn set_fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every `reset` fail while set.
    pub fn set_fail_resets(&self, fail: bool) {
        self.shared.fail_resets.store(fail, Ordering::SeqCst);
    }

    /// Makes every connection fail its liveness check while set.
    ///
    /// A successful reset clears the flag, the way reconnecting to a
    /// recovered server would.
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.shared.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    /// Delays every store operation, and resets, by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.shared.latency.lock() = latency;
    }
}

#[async_trait]
impl ConnectionSource for MemorySource {
    async fn open(&self) -> StoreResult<Box<dyn Store>> {
        let refused = self
            .shared
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(StoreError::Connect("memory store refused connection".to_string()));
        }

        self.shared.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn reset(&self, _conn: &mut Box<dyn Store>) -> StoreResult<()> {
        self.shared.resets.fetch_add(1, Ordering::Relaxed);
        self.shared.simulate_latency().await;
        if self.shared.fail_resets.load(Ordering::SeqCst) {
            return Err(StoreError::Connect("memory store reset failed".to_string()));
        }
        self.shared.unhealthy.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> &str {
        "memory"
    }
}

// == Memory Connection ==
struct MemoryConnection {
    shared: Arc<Shared>,
}

#[async_trait]
impl Store for MemoryConnection {
    async fn put(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.shared.simulate_latency().await;
        self.shared.puts.fetch_add(1, Ordering::Relaxed);
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("put rejected for key '{}'", key)));
        }
        self.shared
            .table
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&mut self, key: &str) -> StoreResult<Option<String>> {
        self.shared.simulate_latency().await;
        self.shared.gets.fetch_add(1, Ordering::Relaxed);
        if self.shared.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("get rejected for key '{}'", key)));
        }
        Ok(self.shared.table.read().get(key).cloned())
    }

    async fn delete(&mut self, key: &str) -> StoreResult<()> {
        self.shared.simulate_latency().await;
        self.shared.deletes.fetch_add(1, Ordering::Relaxed);
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("delete rejected for key '{}'", key)));
        }
        self.shared.table.write().remove(key);
        Ok(())
    }

    async fn ping(&mut self) -> bool {
        !self.shared.unhealthy.load(Ordering::SeqCst)
    }
}
