//! Response DTOs for the key-value service API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::coordinator::ValueSource;
use crate::metrics::MetricsSnapshot;
use crate::pool::PoolStatus;

/// Response body for `POST /create`
#[derive(Debug, Clone, Serialize)]
pub struct CreateResponse {
    pub message: String,
    pub key: String,
}

impl CreateResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' stored", key),
            key,
        }
    }
}

/// Response body for `GET /read`
#[derive(Debug, Clone, Serialize)]
pub struct ReadResponse {
    pub key: String,
    pub value: String,
    /// `cache` or `store`
    pub source: ValueSource,
}

impl ReadResponse {
    pub fn new(key: impl Into<String>, value: impl Into<String>, source: ValueSource) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            source,
        }
    }
}

/// Response body for `DELETE /delete`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted", key),
            key,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    /// Cache hits / (hits + misses)
    pub hit_rate: f64,
    pub pool: PoolStatus,
    pub requests: MetricsSnapshot,
}

impl StatsResponse {
    pub fn new(cache: CacheStats, pool: PoolStatus, requests: MetricsSnapshot) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            pool,
            requests,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` once the pool has lost connections
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a HealthResponse with the current timestamp.
    pub fn new(degraded: bool) -> Self {
        Self {
            status: if degraded { "degraded" } else { "healthy" }.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
