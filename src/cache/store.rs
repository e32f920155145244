//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking, lazy TTL
//! expiration and a memory bound.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::key::pattern_matches;
use crate::cache::{CacheEntry, CacheSnapshot, CacheStats, EvictionReason, LruTracker};

const BYTES_PER_MB: usize = 1024 * 1024;

// == Cache ==
/// Thread-safe cache with per-entry TTL and LRU eviction.
///
/// One mutex guards the whole structure. Every operation is O(1) or
/// O(log n) and the guard is never held across I/O. Lookups never fail:
/// anything unexpected degrades to a miss.
pub struct Cache<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    /// Maximum number of entries allowed
    max_size: usize,
    /// Upper bound for the summed serialized size of all values
    max_memory_bytes: usize,
}

struct CacheInner<K, V> {
    entries: HashMap<K, CacheEntry<K, V>>,
    lru: LruTracker<K>,
    stats: CacheStats,
}

impl<K, V> CacheInner<K, V>
where
    K: Hash + Eq + Clone,
{
    fn remove(&mut self, key: &K, reason: EvictionReason) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.lru.remove(key);
                self.stats.total_size_bytes -= entry.size_bytes;
                self.stats.total_entries = self.entries.len();
                self.stats.record_eviction(reason);
                true
            }
            None => false,
        }
    }

    fn evict_lru(&mut self, reason: EvictionReason) -> bool {
        match self.lru.peek_oldest().cloned() {
            Some(key) => self.remove(&key, reason),
            None => false,
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Display,
    V: Clone + Serialize,
{
    // == Constructor ==
    /// Creates a cache holding at most `max_size` entries and
    /// `max_memory_bytes` of serialized values. A zero size is raised to 1.
    pub fn new(max_size: usize, max_memory_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                lru: LruTracker::new(),
                stats: CacheStats::new(),
            }),
            max_size: max_size.max(1),
            max_memory_bytes,
        }
    }

    /// Same as `new` with the memory bound given in megabytes.
    pub fn with_memory_mb(max_size: usize, max_memory_mb: usize) -> Self {
        Self::new(max_size, max_memory_mb * BYTES_PER_MB)
    }

    // == Get ==
    /// Returns the value if present and not expired.
    ///
    /// A hit refreshes recency. An expired entry is removed and counted as
    /// both an expired eviction and a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();

        let Some(expired) = inner.entries.get(key).map(|entry| entry.is_expired()) else {
            inner.stats.record_miss();
            return None;
        };

        if expired {
            inner.remove(key, EvictionReason::Expired);
            inner.stats.record_miss();
            debug!(key = %key, "cache entry expired");
            return None;
        }

        let value = inner.entries.get_mut(key).map(|entry| {
            entry.access();
            entry.value.clone()
        });
        inner.lru.touch(key);
        inner.stats.record_hit();
        value
    }

    // == Put ==
    /// Stores a value, replacing any previous one under the same key.
    ///
    /// Least recently used entries are evicted until both the memory bound
    /// and the entry count leave room. A value that cannot be serialized,
    /// or that alone exceeds the memory bound, is not cached.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let size_bytes = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes.len(),
            Err(e) => {
                warn!(key = %key, error = %e, "value not cacheable");
                return;
            }
        };

        let mut inner = self.inner.lock();

        if let Some(old) = inner.entries.remove(&key) {
            inner.lru.remove(&key);
            inner.stats.total_size_bytes -= old.size_bytes;
        }

        if size_bytes > self.max_memory_bytes {
            inner.stats.total_entries = inner.entries.len();
            debug!(key = %key, size_bytes, "value larger than cache memory bound, skipped");
            return;
        }

        while inner.stats.total_size_bytes + size_bytes > self.max_memory_bytes {
            if !inner.evict_lru(EvictionReason::Size) {
                break;
            }
        }
        while inner.entries.len() >= self.max_size {
            if !inner.evict_lru(EvictionReason::Size) {
                break;
            }
        }

        inner.lru.touch(&key);
        inner
            .entries
            .insert(key.clone(), CacheEntry::new(key, value, ttl, size_bytes));
        inner.stats.total_size_bytes += size_bytes;
        inner.stats.total_entries = inner.entries.len();
    }

    // == Invalidate ==
    /// Removes one entry. Returns whether anything was removed.
    pub fn invalidate(&self, key: &K) -> bool {
        self.inner.lock().remove(key, EvictionReason::Manual)
    }

    /// Removes every entry whose `Display` form matches `pattern`.
    ///
    /// See [`pattern_matches`](crate::cache::pattern_matches) for the
    /// (deliberately loose) matching rules.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        self.invalidate_where(|key| pattern_matches(pattern, &key.to_string()))
    }

    /// Removes every entry whose key satisfies `predicate`.
    pub fn invalidate_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&K) -> bool,
    {
        let mut inner = self.inner.lock();
        let doomed: Vec<K> = inner
            .entries
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();

        doomed
            .iter()
            .filter(|key| inner.remove(key, EvictionReason::Manual))
            .count()
    }

    // == Clear ==
    /// Drops all entries and resets statistics.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.lru.clear();
        inner.stats = CacheStats::new();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheSnapshot {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.total_entries = inner.entries.len();
        CacheSnapshot {
            hit_rate: stats.hit_rate(),
            stats,
            max_size: self.max_size,
            max_memory_bytes: self.max_memory_bytes,
        }
    }

    /// True when a live entry exists. Does not touch recency or stats.
    pub fn contains(&self, key: &K) -> bool {
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_bytes
    }
}

impl<K, V> Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("max_size", &self.max_size)
            .field("max_memory_bytes", &self.max_memory_bytes)
            .finish_non_exhaustive()
    }
}
