//! Cache Module
//!
//! Provides the fixed-capacity, thread-safe LRU cache that fronts the store.

mod concurrent;
mod entry;
mod lru;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use concurrent::{FillTicket, LruCache};
pub use entry::{CacheEntry, CacheSnapshot};
pub use stats::CacheStats;

pub(crate) use lru::LruCore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
