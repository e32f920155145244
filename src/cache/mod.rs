//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, LRU eviction, a memory
//! bound and wildcard invalidation. The bridge runs three independent
//! instances: field metadata, records and permissions.

mod entry;
mod key;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use key::{pattern_matches, CacheKey};
pub use lru::LruTracker;
pub use stats::{CacheSnapshot, CacheStats, EvictionReason};
pub use store::Cache;
