// src/query_cache.rs
// Query result caching with LRU eviction and collection-level invalidation

use lru::LruCache;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

/// Default number of memoized queries
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Canonical serialization of a filter expression
///
/// Object keys are sorted lexicographically at every depth so that filters
/// differing only in key order share one cache entry; `find(name)` and
/// `find(name, {})` both canonicalize to `{}`.
pub fn canonical_filter(filter: &Value) -> String {
    let mut out = String::new();
    write_canonical(filter, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Hash of a (collection, canonical filter) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey(u64);

impl QueryKey {
    pub fn new(collection: &str, filter: &Value) -> Self {
        let mut hasher = DefaultHasher::new();
        collection.hash(&mut hasher);
        canonical_filter(filter).hash(&mut hasher);
        QueryKey(hasher.finish())
    }
}

/// Query result cache with LRU eviction and collection-level invalidation
///
/// Caches full result lists keyed by (collection, canonical filter).
/// A reverse index (collection name → key set) makes invalidation after a
/// mutation touch only the entries of the mutated collection. Interior
/// locking lets `find(&self, ...)` memoize its results.
pub struct QueryCache {
    cache: RwLock<LruCache<QueryKey, Vec<Value>>>,
    /// Reverse index: collection name → keys cached for that collection
    collection_index: RwLock<HashMap<String, HashSet<QueryKey>>>,
    capacity: usize,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let non_zero_capacity = NonZeroUsize::new(capacity)
            .unwrap_or(NonZeroUsize::MIN);
        QueryCache {
            cache: RwLock::new(LruCache::new(non_zero_capacity)),
            collection_index: RwLock::new(HashMap::new()),
            capacity: non_zero_capacity.get(),
        }
    }

    /// Cached result for a key, if present
    ///
    /// Uses peek() so reads do not reshuffle the LRU order.
    pub fn get(&self, key: &QueryKey) -> Option<Vec<Value>> {
        let cache = self.cache.read();
        cache.peek(key).cloned()
    }

    /// Memoize a query result
    ///
    /// Maintains the reverse index; when the insert evicts the LRU entry,
    /// the evicted key is scrubbed from the index as well.
    pub fn insert(&self, collection: &str, key: QueryKey, results: Vec<Value>) {
        let mut cache = self.cache.write();

        if cache.len() >= self.capacity && !cache.contains(&key) {
            if let Some((evicted, _)) = cache.peek_lru() {
                let evicted = *evicted;
                drop(cache);
                let mut index = self.collection_index.write();
                for keys in index.values_mut() {
                    keys.remove(&evicted);
                }
                drop(index);
                cache = self.cache.write();
            }
        }

        cache.put(key, results);
        drop(cache);

        let mut index = self.collection_index.write();
        index.entry(collection.to_string()).or_default().insert(key);
    }

    /// Drop every cached query for one collection
    ///
    /// Called after insert/update/drop so stale results can never be served.
    pub fn invalidate_collection(&self, collection: &str) {
        let mut index = self.collection_index.write();
        let keys = index.remove(collection);
        drop(index);

        if let Some(keys) = keys {
            let mut cache = self.cache.write();
            for key in keys {
                cache.pop(&key);
            }
        }
    }

    /// Empty the cache wholesale
    pub fn clear(&self) {
        self.cache.write().clear();
        self.collection_index.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.read();
        CacheStats {
            capacity: self.capacity,
            size: cache.len(),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub capacity: usize,
    pub size: usize,
}
