//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::Serialize;

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// TTL elapsed, detected on lookup
    Expired,
    /// Removed to respect the entry count or memory bound
    Size,
    /// Explicit invalidation
    Manual,
}

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Total removals, whatever the reason
    pub evictions: u64,
    /// Removals caused by TTL expiry
    pub expired_evictions: u64,
    /// Removals caused by the entry count or memory bound
    pub size_evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Current approximate size of all values
    pub total_size_bytes: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Counts a removal and files it under its reason.
    pub fn record_eviction(&mut self, reason: EvictionReason) {
        self.evictions += 1;
        match reason {
            EvictionReason::Expired => self.expired_evictions += 1,
            EvictionReason::Size => self.size_evictions += 1,
            EvictionReason::Manual => {}
        }
    }
}

// == Snapshot ==
/// Point-in-time report returned by `Cache::stats`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
    pub max_size: usize,
    pub max_memory_bytes: usize,
}
