//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// Expiry is evaluated lazily by the store on lookup; nothing sweeps
/// entries in the background.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// The key this entry is stored under
    pub key: K,
    /// The stored value
    pub value: V,
    /// Insertion time
    pub created_at: Instant,
    /// Last successful lookup (or insertion)
    pub last_accessed_at: Instant,
    /// Time to live, measured from `created_at`
    pub ttl: Duration,
    /// Number of hits served by this entry
    pub hit_count: u64,
    /// Approximate serialized size in bytes
    pub size_bytes: usize,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(key: K, value: V, ttl: Duration, size_bytes: usize) -> Self {
        let now = Instant::now();
        Self {
            key,
            value,
            created_at: now,
            last_accessed_at: now,
            ttl,
            hit_count: 0,
            size_bytes,
        }
    }

    // == Is Expired ==
    /// An entry is expired once its age is strictly greater than its TTL.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    // == Time To Live ==
    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }

    // == Access ==
    /// Records a hit on this entry.
    pub fn access(&mut self) {
        self.last_accessed_at = Instant::now();
        self.hit_count += 1;
    }
}
