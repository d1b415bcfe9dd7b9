//! Concurrent LRU Cache Module
//!
//! Thread-safe LRU cache shared by every request handler.
//!
//! All state sits behind one `parking_lot::Mutex`; each public operation takes
//! the lock exactly once and never awaits while holding it.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

use super::{CacheEntry, CacheSnapshot, CacheStats, LruCore};

// == Fill Fences ==
/// Version counter for one key, kept only while tickets for it are out.
#[derive(Debug, Default)]
struct Fence {
    version: u64,
    outstanding: usize,
}

// == Fill Ticket ==
/// Version stamp for one key, taken before a store round trip and checked
/// when the result is written back with [`fill`](FillTicket::fill).
///
/// While any ticket for a key is outstanding, every `put`, `remove` and
/// committed fill of that key advances its version. A fill carrying an older
/// version could overwrite a newer write or resurrect an invalidated key, so
/// it is dropped. Writes to other keys never affect the ticket.
///
/// Dropping an unused ticket releases it.
pub struct FillTicket<'a> {
    cache: &'a LruCache,
    key: String,
    version: u64,
    armed: bool,
}

impl FillTicket<'_> {
    /// Caches `value` under the ticket's key unless the key was written or
    /// invalidated after the ticket was taken. Returns whether it was cached.
    pub fn fill(mut self, value: impl Into<String>) -> bool {
        self.armed = false;
        let key = std::mem::take(&mut self.key);

        let mut inner = self.cache.inner.lock();
        let current = inner.release(&key);
        if current != Some(self.version) {
            inner.stats.record_skipped_fill();
            return false;
        }
        inner.bump(&key);
        inner.insert(key, value.into());
        true
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for FillTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.inner.lock().release(&self.key);
        }
    }
}

impl fmt::Debug for FillTicket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillTicket")
            .field("key", &self.key)
            .field("version", &self.version)
            .finish()
    }
}

#[derive(Debug)]
struct Inner {
    core: LruCore,
    stats: CacheStats,
    fences: HashMap<String, Fence>,
}

impl Inner {
    fn bump(&mut self, key: &str) {
        if let Some(fence) = self.fences.get_mut(key) {
            fence.version = fence.version.wrapping_add(1);
        }
    }

    /// Returns one ticket for `key` and reports the version it was checked
    /// against. The fence is dropped with its last ticket.
    fn release(&mut self, key: &str) -> Option<u64> {
        let fence = self.fences.get_mut(key)?;
        let version = fence.version;
        fence.outstanding -= 1;
        if fence.outstanding == 0 {
            self.fences.remove(key);
        }
        Some(version)
    }

    fn insert(&mut self, key: String, value: String) {
        if self.core.put(key, value).is_some() {
            self.stats.record_eviction();
        }
        self.stats.record_insertion();
        self.stats.set_total_entries(self.core.len());
    }
}

// == LRU Cache ==
/// Fixed-capacity, thread-safe cache with strict LRU eviction.
#[derive(Debug)]
pub struct LruCache {
    inner: Mutex<Inner>,
}

impl LruCache {
    // == Constructor ==
    /// Creates a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                core: LruCore::new(capacity),
                stats: CacheStats::new(),
                fences: HashMap::new(),
            }),
        }
    }

    // == Put ==
    /// Stores `value` under `key` as the most recently used entry.
    ///
    /// A new key in a full cache silently evicts the least recently used
    /// entry; nothing else is notified.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();

        let mut inner = self.inner.lock();
        inner.bump(&key);
        inner.insert(key, value.into());
    }

    // == Get ==
    /// Returns a copy of the value for `key`, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let value = inner.core.get(key).map(str::to_owned);
        match value {
            Some(_) => inner.stats.record_hit(),
            None => inner.stats.record_miss(),
        }
        value
    }

    // == Remove ==
    /// Invalidates `key`. Returns whether an entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.bump(key);
        let removed = inner.core.remove(key).is_some();
        if removed {
            let len = inner.core.len();
            inner.stats.record_invalidation();
            inner.stats.set_total_entries(len);
        }
        removed
    }

    // == Fill Fencing ==
    /// Takes a ticket for a later fill of `key`.
    pub fn fill_ticket(&self, key: &str) -> FillTicket<'_> {
        let mut inner = self.inner.lock();
        let fence = inner.fences.entry(key.to_string()).or_default();
        fence.outstanding += 1;
        FillTicket {
            cache: self,
            key: key.to_string(),
            version: fence.version,
            armed: true,
        }
    }

    /// Number of keys with outstanding fill tickets.
    pub fn pending_fills(&self) -> usize {
        self.inner.lock().fences.len()
    }

    // == Snapshot ==
    /// Copies the cache contents from most to least recently used.
    pub fn snapshot(&self) -> CacheSnapshot {
        let inner = self.inner.lock();
        CacheSnapshot {
            occupied: inner.core.len(),
            capacity: inner.core.capacity(),
            items: inner
                .core
                .iter()
                .map(|(k, v)| CacheEntry::new(k, v))
                .collect(),
        }
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.core.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.inner.lock().core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().core.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().core.capacity()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_cache_put_and_get() {
        let cache = LruCache::new(10);
        cache.put("key1", "value1");

        assert_eq!(cache.get("key1"), Some("value1".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_get_nonexistent() {
        let cache = LruCache::new(10);
        assert_eq!(cache.get("nonexistent"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_cache_remove() {
        let cache = LruCache::new(10);
        cache.put("key1", "value1");

        assert!(cache.remove("key1"));
        assert!(!cache.remove("key1"));
        assert!(cache.is_empty());
        assert_eq!(cache.get("key1"), None);
    }

    #[test]
    fn test_cache_overwrite() {
        let cache = LruCache::new(10);
        cache.put("key1", "value1");
        cache.put("key1", "value2");

        assert_eq!(cache.get("key1"), Some("value2".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_eviction_scenario() {
        let cache = LruCache::new(2);
        cache.put("A", "1");
        cache.put("B", "2");
        assert_eq!(cache.snapshot().keys(), vec!["B", "A"]);

        cache.put("C", "3");
        assert_eq!(cache.snapshot().keys(), vec!["C", "B"]);
        assert_eq!(cache.stats().evictions, 1);

        cache.put("A", "1");
        assert_eq!(cache.snapshot().keys(), vec!["A", "C"]);
        assert_eq!(cache.get("B"), None);
    }

    #[test]
    fn test_snapshot_reports_capacity() {
        let cache = LruCache::new(3);
        cache.put("x", "1");

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.occupied, 1);
        assert_eq!(snapshot.capacity, 3);
        assert_eq!(snapshot.items, vec![CacheEntry::new("x", "1")]);
    }

    #[test]
    fn test_fill_with_current_ticket() {
        let cache = LruCache::new(4);
        let ticket = cache.fill_ticket("k");

        assert!(ticket.fill("v"));
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.pending_fills(), 0);
    }

    #[test]
    fn test_fill_after_remove_is_dropped() {
        let cache = LruCache::new(4);
        cache.put("k", "old");

        let ticket = cache.fill_ticket("k");
        cache.remove("k");

        assert!(!ticket.fill("old"));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().skipped_fills, 1);
    }

    #[test]
    fn test_first_of_concurrent_tickets_wins() {
        let cache = LruCache::new(4);
        let first = cache.fill_ticket("k");
        let second = cache.fill_ticket("k");

        assert!(first.fill("first"));
        assert!(!second.fill("second"));
        assert_eq!(cache.get("k"), Some("first".to_string()));
    }

    #[test]
    fn test_fill_after_put_is_dropped() {
        let cache = LruCache::new(4);
        let ticket = cache.fill_ticket("k");
        cache.put("k", "new");

        assert!(!ticket.fill("stale"));
        assert_eq!(cache.get("k"), Some("new".to_string()));
    }

    #[test]
    fn test_other_keys_do_not_fence_a_fill() {
        let cache = LruCache::new(256);
        let ticket = cache.fill_ticket("user:1");

        // Enough distinct keys that any hash bucketing would collide
        for i in 0..200 {
            let key = format!("other:{}", i);
            let other = cache.fill_ticket(&key);
            assert!(other.fill("x"));
            cache.put(key.clone(), "y");
            cache.remove(&key);
        }

        assert!(ticket.fill("mine"));
        assert_eq!(cache.get("user:1"), Some("mine".to_string()));
    }

    #[test]
    fn test_dropped_tickets_release_fences() {
        let cache = LruCache::new(4);
        {
            let _a = cache.fill_ticket("a");
            let _b = cache.fill_ticket("b");
            let _b2 = cache.fill_ticket("b");
            assert_eq!(cache.pending_fills(), 2);
        }
        assert_eq!(cache.pending_fills(), 0);

        // A fresh ticket after the release is current again
        cache.remove("a");
        assert!(cache.fill_ticket("a").fill("v"));
    }

    #[test]
    fn test_concurrent_access_respects_capacity() {
        let cache = Arc::new(LruCache::new(16));
        let mut handles = vec![];

        for t in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    let key = format!("t{}_k{}", t, i % 40);
                    cache.put(key.clone(), format!("v{}", i));
                    let _ = cache.get(&key);
                    if i % 7 == 0 {
                        cache.remove(&key);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = cache.snapshot();
        assert!(snapshot.occupied <= 16);
        assert_eq!(snapshot.items.len(), snapshot.occupied);
    }
}
