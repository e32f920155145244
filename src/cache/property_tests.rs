//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache invariants under random operation
//! sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::thread::sleep;
use std::time::Duration;

use crate::cache::Cache;

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_MEMORY_BYTES: usize = 1024 * 1024;
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}"
}

fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    Get { key: String },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Put { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

fn unique(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses reported by stats match what callers observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let store: Cache<String, String> = Cache::new(TEST_MAX_ENTRIES, TEST_MEMORY_BYTES);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => store.put(key, value, TEST_TTL),
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Invalidate { key } => {
                    store.invalidate(&key);
                }
            }
        }

        let stats = store.stats().stats;
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, store.len(), "Total entries mismatch");
    }

    // A value read back before its TTL is the value that was stored.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in valid_value_strategy()) {
        let store: Cache<String, String> = Cache::new(TEST_MAX_ENTRIES, TEST_MEMORY_BYTES);
        store.put(key.clone(), value.clone(), TEST_TTL);
        prop_assert_eq!(store.get(&key), Some(value));
    }

    // The entry count never exceeds max_size.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((valid_key_strategy(), valid_value_strategy()), 1..200)
    ) {
        let max_entries = 50;
        let store: Cache<String, String> = Cache::new(max_entries, TEST_MEMORY_BYTES);

        for (key, value) in entries {
            store.put(key, value, TEST_TTL);
            prop_assert!(store.len() <= max_entries, "Cache size {} exceeds max {}", store.len(), max_entries);
        }
    }

    // The summed value size never exceeds the memory bound.
    #[test]
    fn prop_memory_bound(
        entries in prop::collection::vec((valid_key_strategy(), valid_value_strategy()), 1..100),
        bound in 64usize..2048
    ) {
        let store: Cache<String, String> = Cache::new(TEST_MAX_ENTRIES, bound);

        for (key, value) in entries {
            store.put(key, value, TEST_TTL);
            let stats = store.stats().stats;
            prop_assert!(stats.total_size_bytes <= bound, "{} bytes over bound {}", stats.total_size_bytes, bound);
        }
    }

    // Filling to capacity and adding one more key evicts exactly the first key.
    #[test]
    fn prop_lru_eviction_order(
        initial_keys in prop::collection::vec(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy(),
        new_value in valid_value_strategy()
    ) {
        let unique_keys = unique(initial_keys);
        prop_assume!(unique_keys.len() >= 2);
        prop_assume!(!unique_keys.contains(&new_key));

        let capacity = unique_keys.len();
        let store: Cache<String, String> = Cache::new(capacity, TEST_MEMORY_BYTES);
        for key in &unique_keys {
            store.put(key.clone(), format!("value_{}", key), TEST_TTL);
        }

        store.put(new_key.clone(), new_value, TEST_TTL);

        prop_assert_eq!(store.len(), capacity);
        prop_assert!(!store.contains(&unique_keys[0]), "Oldest key should have been evicted");
        prop_assert!(store.contains(&new_key));
        for key in unique_keys.iter().skip(1) {
            prop_assert!(store.contains(key), "Key '{}' should still exist", key);
        }
    }

    // A key read just before the overflow is not the one evicted.
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::vec(valid_key_strategy(), 3..8),
        access_index in 0usize..100,
        new_key in valid_key_strategy()
    ) {
        let unique_keys = unique(keys);
        prop_assume!(unique_keys.len() >= 3);
        prop_assume!(!unique_keys.contains(&new_key));

        let capacity = unique_keys.len();
        let store: Cache<String, String> = Cache::new(capacity, TEST_MEMORY_BYTES);
        for key in &unique_keys {
            store.put(key.clone(), "v".to_string(), TEST_TTL);
        }

        let accessed = &unique_keys[access_index % capacity];
        prop_assert!(store.get(accessed).is_some());

        store.put(new_key, "v".to_string(), TEST_TTL);

        prop_assert!(store.contains(accessed), "Recently read key '{}' was evicted", accessed);
        let expected_victim = unique_keys.iter().find(|k| *k != accessed).unwrap();
        prop_assert!(!store.contains(expected_victim));
    }

    // Pattern invalidation removes exactly the keys of the targeted model.
    #[test]
    fn prop_pattern_invalidation_scoped(
        partner_ids in prop::collection::hash_set(1u32..10_000, 1..20),
        user_ids in prop::collection::hash_set(1u32..10_000, 1..20)
    ) {
        let store: Cache<String, u32> = Cache::new(TEST_MAX_ENTRIES, TEST_MEMORY_BYTES);
        for id in &partner_ids {
            store.put(format!("model:res.partner:{}", id), *id, TEST_TTL);
        }
        for id in &user_ids {
            store.put(format!("model:res.users:{}", id), *id, TEST_TTL);
        }

        let removed = store.invalidate_pattern("model:res.partner:*");

        prop_assert_eq!(removed, partner_ids.len());
        prop_assert_eq!(store.len(), user_ids.len());
    }
}

// Separate proptest block with fewer cases for time-sensitive TTL tests
proptest! {
    #![proptest_config(ProptestConfig::with_cases(5))]

    // After the TTL has elapsed a lookup misses and counts one expiry.
    #[test]
    fn prop_ttl_expiration_behavior(key in valid_key_strategy(), value in valid_value_strategy()) {
        let store: Cache<String, String> = Cache::new(TEST_MAX_ENTRIES, TEST_MEMORY_BYTES);
        store.put(key.clone(), value.clone(), Duration::from_millis(30));

        prop_assert_eq!(store.get(&key), Some(value));
        sleep(Duration::from_millis(60));

        prop_assert_eq!(store.get(&key), None);
        prop_assert_eq!(store.stats().stats.expired_evictions, 1);
    }
}
