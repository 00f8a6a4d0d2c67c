//! # Degraded In-Memory Cache
//!
//! Bounded cache of hot reference rows consulted while the machine sits in
//! `memory` or `memory_optimized` mode. Insertion-ordered eviction: oldest
//! key drops when the bound is reached. No persistence, no TTL; the cache
//! lives and dies with the process.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

pub struct DegradedCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    entries: HashMap<String, Value>,
    order: VecDeque<String>,
}

impl DegradedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn put(&self, key: &str, value: Value) {
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(key) {
            if inner.order.len() >= self.capacity {
                if let Some(evicted) = inner.order.pop_front() {
                    inner.entries.remove(&evicted);
                }
            }
            inner.order.push_back(key.to_string());
        }
        inner.entries.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_round_trip() {
        let cache = DegradedCache::new(4);
        cache.put("election:tx-2026", json!({"state": "TX"}));
        assert_eq!(cache.get("election:tx-2026").unwrap()["state"], "TX");
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn overflow_evicts_oldest_entry() {
        let cache = DegradedCache::new(2);
        cache.put("a", json!(1));
        cache.put("b", json!(2));
        cache.put("c", json!(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn overwriting_does_not_grow_the_cache() {
        let cache = DegradedCache::new(2);
        cache.put("a", json!(1));
        cache.put("a", json!(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap(), json!(2));
    }
}
