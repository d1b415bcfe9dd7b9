//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the LRU cache against a naive recency model.

use proptest::prelude::*;

use crate::cache::LruCache;

// == Strategies ==
/// Generates keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-h]{1,2}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,16}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    Get { key: String },
    Remove { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Remove { key }),
    ]
}

// == Reference Model ==
/// Vec-backed LRU: index 0 is most recently used.
struct Model {
    capacity: usize,
    items: Vec<(String, String)>,
}

impl Model {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::new(),
        }
    }

    fn put(&mut self, key: &str, value: &str) {
        if let Some(pos) = self.items.iter().position(|(k, _)| k == key) {
            self.items.remove(pos);
        } else if self.items.len() == self.capacity {
            self.items.pop();
        }
        self.items.insert(0, (key.to_string(), value.to_string()));
    }

    fn get(&mut self, key: &str) -> Option<String> {
        let pos = self.items.iter().position(|(k, _)| k == key)?;
        let item = self.items.remove(pos);
        let value = item.1.clone();
        self.items.insert(0, item);
        Some(value)
    }

    fn remove(&mut self, key: &str) {
        self.items.retain(|(k, _)| k != key);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Any operation sequence leaves the cache identical to the model,
    // never above capacity, with the snapshot count equal to its size.
    #[test]
    fn prop_matches_reference_model(
        capacity in 1usize..6,
        ops in prop::collection::vec(cache_op_strategy(), 1..120)
    ) {
        let cache = LruCache::new(capacity);
        let mut model = Model::new(capacity);

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    cache.put(key.clone(), value.clone());
                    model.put(&key, &value);
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(cache.get(&key), model.get(&key), "Get mismatch for {}", key);
                }
                CacheOp::Remove { key } => {
                    cache.remove(&key);
                    model.remove(&key);
                }
            }

            let snapshot = cache.snapshot();
            prop_assert!(snapshot.occupied <= capacity, "Size {} exceeds {}", snapshot.occupied, capacity);
            prop_assert_eq!(snapshot.items.len(), snapshot.occupied);
            prop_assert_eq!(snapshot.capacity, capacity);

            let actual: Vec<(String, String)> = snapshot
                .items
                .into_iter()
                .map(|e| (e.key, e.value))
                .collect();
            prop_assert_eq!(&actual, &model.items, "Recency order diverged");
        }
    }

    // Inserting C+1 distinct keys with no reads evicts exactly the first.
    #[test]
    fn prop_first_key_evicted(capacity in 1usize..20) {
        let cache = LruCache::new(capacity);
        for i in 0..=capacity {
            cache.put(format!("key_{}", i), format!("value_{}", i));
        }

        prop_assert_eq!(cache.len(), capacity);
        prop_assert_eq!(cache.get("key_0"), None);
        for i in 1..=capacity {
            let key = format!("key_{}", i);
            prop_assert_eq!(cache.get(&key), Some(format!("value_{}", i)));
        }
    }

    // Put then Get returns the value; Remove then Get returns nothing.
    #[test]
    fn prop_put_get_remove(key in key_strategy(), value in value_strategy()) {
        let cache = LruCache::new(4);

        cache.put(key.clone(), value.clone());
        prop_assert_eq!(cache.get(&key), Some(value));

        cache.remove(&key);
        prop_assert_eq!(cache.get(&key), None);
    }

    // A touched key survives the next eviction unless it is the only key.
    #[test]
    fn prop_access_protects_from_eviction(
        capacity in 2usize..10,
        touch in 0usize..10,
        by_get in any::<bool>()
    ) {
        let touch = touch % capacity;
        let cache = LruCache::new(capacity);
        for i in 0..capacity {
            cache.put(format!("k{}", i), "v");
        }

        let touched = format!("k{}", touch);
        if by_get {
            cache.get(&touched);
        } else {
            cache.put(touched.clone(), "v2");
        }
        let before = cache.snapshot();
        prop_assert_eq!(&before.items[0].key, &touched);

        cache.put("fresh", "v");
        let after = cache.snapshot();
        let keys = after.keys();
        prop_assert!(keys.contains(&touched.as_str()));

        let expected_evicted = if touch == 0 { "k1" } else { "k0" };
        prop_assert!(!keys.contains(&expected_evicted));
    }
}
