//! LRU Core Module
//!
//! Single-threaded LRU map with O(1) get, put and remove.
//!
//! Entries live in a `Vec` arena linked into a doubly-linked recency list by
//! index; a `HashMap` maps each key to its slot. Freed slots are chained
//! into a free list and reused.

use std::collections::HashMap;

use super::CacheEntry;

/// Null link in the recency list.
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node {
    entry: Option<CacheEntry>,
    prev: usize,
    next: usize,
}

// == LRU Core ==
/// Fixed-capacity map ordered by recency.
///
/// - Head = most recently used
/// - Tail = least recently used
///
/// A capacity of zero stores nothing.
#[derive(Debug)]
pub struct LruCore {
    capacity: usize,
    index: HashMap<String, usize>,
    arena: Vec<Node>,
    head: usize,
    tail: usize,
    free: usize,
}

impl LruCore {
    // == Constructor ==
    /// Creates an empty map holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: HashMap::with_capacity(capacity),
            arena: Vec::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            free: NIL,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    // == Get ==
    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &str) -> Option<&str> {
        let idx = *self.index.get(key)?;
        self.move_to_head(idx);
        self.arena[idx].entry.as_ref().map(|e| e.value.as_str())
    }

    // == Put ==
    /// Inserts or updates `key` and marks it most recently used.
    ///
    /// Updating an existing key never evicts. Inserting a new key into a
    /// full map evicts the least recently used entry first and returns it.
    pub fn put(&mut self, key: String, value: String) -> Option<CacheEntry> {
        if let Some(&idx) = self.index.get(&key) {
            if let Some(entry) = self.arena[idx].entry.as_mut() {
                entry.value = value;
            }
            self.move_to_head(idx);
            return None;
        }

        if self.capacity == 0 {
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.pop_tail()
        } else {
            None
        };

        let idx = self.alloc(CacheEntry { key: key.clone(), value });
        self.push_head(idx);
        self.index.insert(key, idx);

        evicted
    }

    // == Remove ==
    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.index.remove(key)?;
        self.unlink(idx);
        self.release(idx).map(|e| e.value)
    }

    // == Peek Oldest ==
    /// Returns the least recently used entry without touching it.
    #[cfg(test)]
    pub fn peek_lru(&self) -> Option<&CacheEntry> {
        if self.tail == NIL {
            return None;
        }
        self.arena[self.tail].entry.as_ref()
    }

    // == Iterate ==
    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            arena: &self.arena,
            cursor: self.head,
        }
    }

    // == List Maintenance ==
    fn alloc(&mut self, entry: CacheEntry) -> usize {
        let node = Node {
            entry: Some(entry),
            prev: NIL,
            next: NIL,
        };
        if self.free != NIL {
            let idx = self.free;
            self.free = self.arena[idx].next;
            self.arena[idx] = node;
            idx
        } else {
            self.arena.push(node);
            self.arena.len() - 1
        }
    }

    fn release(&mut self, idx: usize) -> Option<CacheEntry> {
        let entry = self.arena[idx].entry.take();
        self.arena[idx].next = self.free;
        self.free = idx;
        entry
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.arena[idx].prev, self.arena[idx].next);

        if prev != NIL {
            self.arena[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.arena[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.arena[idx].prev = NIL;
        self.arena[idx].next = NIL;
    }

    fn push_head(&mut self, idx: usize) {
        self.arena[idx].prev = NIL;
        self.arena[idx].next = self.head;
        if self.head != NIL {
            self.arena[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn move_to_head(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_head(idx);
        }
    }

    fn pop_tail(&mut self) -> Option<CacheEntry> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        self.unlink(idx);
        let entry = self.release(idx)?;
        self.index.remove(&entry.key);
        Some(entry)
    }
}

// == Iterator ==
/// Iterator over `(key, value)` pairs from MRU to LRU.
pub struct Iter<'a> {
    arena: &'a [Node],
    cursor: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.arena[self.cursor];
        self.cursor = node.next;
        node.entry
            .as_ref()
            .map(|e| (e.key.as_str(), e.value.as_str()))
    }
}
