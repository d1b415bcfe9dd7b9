//! Cache Entry Module
//!
//! Defines cache entries and the point-in-time snapshot of the whole cache.

use serde::Serialize;

// == Cache Entry ==
/// A single cached key-value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// The cache key
    pub key: String,
    /// The cached value
    pub value: String,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// == Cache Snapshot ==
/// Consistent copy of the cache taken under its lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    /// Number of entries currently cached
    pub occupied: usize,
    /// Fixed capacity of the cache
    pub capacity: usize,
    /// Entries ordered from most- to least-recently used
    pub items: Vec<CacheEntry>,
}

impl CacheSnapshot {
    /// Keys in MRU to LRU order.
    pub fn keys(&self) -> Vec<&str> {
        self.items.iter().map(|e| e.key.as_str()).collect()
    }
}
