//! Service Metrics
//!
//! Request counters accumulated by the coordinator. One instance is created
//! at startup and shared through `Arc`; all updates go through
//! [`ServiceMetrics::record`] under its own lock.

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Delete,
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Succeeded against the store
    Ok,
    /// Read answered from the cache
    CacheHit,
    NotFound,
    StoreFailure,
    PoolTimeout,
    PoolExhausted,
}

// == Operation Metrics ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationMetrics {
    pub requests: u64,
    pub ok: u64,
    pub cache_hits: u64,
    pub not_found: u64,
    pub store_failures: u64,
    pub pool_timeouts: u64,
    pub pool_exhausted: u64,
    /// Mean request latency in milliseconds
    pub mean_latency_ms: f64,
    #[serde(skip)]
    total_latency: Duration,
}

impl OperationMetrics {
    fn record(&mut self, outcome: Outcome, latency: Duration) {
        self.requests += 1;
        match outcome {
            Outcome::Ok => self.ok += 1,
            Outcome::CacheHit => self.cache_hits += 1,
            Outcome::NotFound => self.not_found += 1,
            Outcome::StoreFailure => self.store_failures += 1,
            Outcome::PoolTimeout => self.pool_timeouts += 1,
            Outcome::PoolExhausted => self.pool_exhausted += 1,
        }
        self.total_latency += latency;
        self.mean_latency_ms = self.total_latency.as_secs_f64() * 1000.0 / self.requests as f64;
    }
}

// == Metrics Snapshot ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub create: OperationMetrics,
    pub read: OperationMetrics,
    pub delete: OperationMetrics,
}

// == Service Metrics ==
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts one finished request.
    pub fn record(&self, op: Operation, outcome: Outcome, latency: Duration) {
        let mut inner = self.inner.lock();
        let slot = match op {
            Operation::Create => &mut inner.create,
            Operation::Read => &mut inner.read,
            Operation::Delete => &mut inner.delete,
        };
        slot.record(outcome, latency);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().clone()
    }
}
