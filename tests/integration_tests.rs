//! StrataCache Integration Tests
//!
//! End-to-end coverage of the public surface:
//! - Admission routing, lookup, and promotion across layers
//! - Encoding transforms (compression, encryption) surviving promotion
//! - Eviction, expiry, and adaptive rescaling
//! - Background maintenance lifecycle
//! - Concurrent access

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde::{Deserialize, Serialize};
use stratacache::{
    CacheConfig, Error, EvictionStrategy, LayerConfig, MaintenanceConfig, MaintenanceHandle,
    Priority, SetOptions, StrataCache,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Document {
    id: u64,
    title: String,
    body: String,
}

fn doc(id: u64, body_len: usize) -> Document {
    Document {
        id,
        title: format!("doc-{}", id),
        body: "lorem ipsum ".repeat(body_len / 12 + 1),
    }
}

fn layer(
    name: &str,
    max_bytes: u64,
    max_age: Duration,
    strategy: EvictionStrategy,
) -> LayerConfig {
    LayerConfig::new(name, max_bytes, max_age, strategy)
}

// =============================================================================
// Admission and Lookup
// =============================================================================

mod admission_tests {
    use super::*;

    #[test]
    fn test_small_value_routes_to_middle_layer() {
        let cache = StrataCache::new(CacheConfig::with_layers(vec![
            layer("memory", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
            layer("disk", 4 * 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lfu),
            layer("network", 8 * 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Ttl),
        ]))
        .unwrap();

        let placed = cache.set("k", &doc(1, 100), SetOptions::default()).unwrap();
        assert_eq!(placed, "disk");
    }

    #[test]
    fn test_fast_slow_pair_places_medium_value_in_slow() {
        // A fast 1KB LRU layer over a slow 1MB LFU layer. A ~2000-byte body
        // is "middle" routed, and with two layers the middle is the second.
        let cache = StrataCache::new(CacheConfig::with_layers(vec![
            layer("fast", 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
            layer("slow", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lfu),
        ]))
        .unwrap();

        let value = doc(1, 2000);
        let placed = cache.set("medium", &value, SetOptions::default()).unwrap();
        assert_eq!(placed, "slow");

        let got: Option<Document> = cache.get("medium").unwrap();
        assert_eq!(got, Some(value));
    }

    #[test]
    fn test_priority_routing() {
        let cache = StrataCache::new(CacheConfig::with_layers(vec![
            layer("a", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
            layer("b", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
            layer("c", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
        ]))
        .unwrap();

        let high = cache
            .set("h", &doc(1, 50), SetOptions::with_priority(Priority::High))
            .unwrap();
        let low = cache
            .set("l", &doc(2, 50), SetOptions::with_priority(Priority::Low))
            .unwrap();

        assert_eq!(high, "a");
        assert_eq!(low, "c");
    }

    #[test]
    fn test_large_object_routes_to_last_layer() {
        let mut config = CacheConfig::with_layers(vec![
            layer("a", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
            layer("b", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
            layer("c", 4 * 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Ttl),
        ]);
        // Lower the large-object bar so the test payload stays small
        config.admission.large_object_bytes = 10 * 1024;
        let cache = StrataCache::new(config).unwrap();

        let placed = cache.set("blob", &doc(1, 20 * 1024), SetOptions::default()).unwrap();
        assert_eq!(placed, "c");
    }

    #[test]
    fn test_explicit_layer_wins_over_everything() {
        let mut config = CacheConfig::with_layers(vec![
            layer("a", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
            layer("b", 4 * 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
        ]);
        config.admission.large_object_bytes = 1024;
        let cache = StrataCache::new(config).unwrap();

        // Large payload with high priority, but pinned explicitly to "a"
        let mut options = SetOptions::in_layer("a");
        options.priority = Priority::Low;
        let placed = cache.set("pinned", &doc(1, 10 * 1024), options).unwrap();
        assert_eq!(placed, "a");
    }

    #[test]
    fn test_unknown_layer_rejected() {
        let cache = StrataCache::with_defaults().unwrap();
        let result = cache.set("k", &doc(1, 10), SetOptions::in_layer("tape"));
        assert_matches!(result, Err(Error::UnknownLayer { name }) if name == "tape");
    }

    #[test]
    fn test_miss_is_ok_none_not_error() {
        let cache = StrataCache::with_defaults().unwrap();
        let got: Option<Document> = cache.get("never-set").unwrap();
        assert!(got.is_none());
    }
}

// =============================================================================
// Promotion
// =============================================================================

mod promotion_tests {
    use super::*;

    fn two_layers() -> StrataCache {
        StrataCache::new(CacheConfig::with_layers(vec![
            layer("fast", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
            layer("slow", 4 * 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lfu),
        ]))
        .unwrap()
    }

    #[test]
    fn test_hot_entry_climbs_to_front() {
        let cache = two_layers();
        let value = doc(1, 200);
        cache.set("hot", &value, SetOptions::in_layer("slow")).unwrap();

        for _ in 0..5 {
            let got: Option<Document> = cache.get("hot").unwrap();
            assert!(got.is_some());
        }

        let stats = cache.stats();
        let fast = &stats.layers[0];
        let slow = &stats.layers[1];
        assert_eq!(fast.promotions_in, 1);
        assert_eq!(slow.promotions_out, 1);
        assert_eq!(fast.entries, 1);
        assert_eq!(slow.entries, 0);
    }

    #[test]
    fn test_promotion_is_a_move_not_a_copy() {
        let cache = two_layers();
        cache.set("hot", &doc(1, 200), SetOptions::in_layer("slow")).unwrap();

        let before = cache.stats().total_resident_bytes;
        for _ in 0..5 {
            let _: Option<Document> = cache.get("hot").unwrap();
        }
        assert_eq!(cache.stats().total_resident_bytes, before);

        // The value resides in exactly one layer
        let stats = cache.stats();
        let total_entries: usize = stats.layers.iter().map(|l| l.entries).sum();
        assert_eq!(total_entries, 1);
    }

    #[test]
    fn test_cold_entry_stays_put() {
        let cache = two_layers();
        cache.set("cold", &doc(1, 200), SetOptions::in_layer("slow")).unwrap();

        // One access is below the promotion threshold
        let _: Option<Document> = cache.get("cold").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.layers[0].entries, 0);
        assert_eq!(stats.layers[1].entries, 1);
    }

    #[test]
    fn test_encoding_survives_promotion() {
        // Compressed on admission to "packed"; still readable after
        // promotion into "plain", whose own flags say no compression.
        let mut config = CacheConfig::with_layers(vec![
            layer("plain", 4 * 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
            layer("packed", 8 * 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lfu)
                .compressed(),
        ]);
        config.compression.min_size_bytes = 256;
        let cache = StrataCache::new(config).unwrap();

        let value = doc(1, 32 * 1024);
        cache.set("k", &value, SetOptions::in_layer("packed")).unwrap();

        for _ in 0..5 {
            let got: Option<Document> = cache.get("k").unwrap();
            assert_eq!(got.as_ref(), Some(&value));
        }

        let stats = cache.stats();
        assert_eq!(stats.layers[0].entries, 1);
        let got: Option<Document> = cache.get("k").unwrap();
        assert_eq!(got, Some(value));
    }
}

// =============================================================================
// Encoding: Compression and Encryption
// =============================================================================

mod encoding_tests {
    use super::*;

    #[test]
    fn test_compression_reduces_resident_size() {
        let mut config = CacheConfig::with_layers(vec![layer(
            "packed",
            8 * 1024 * 1024,
            Duration::from_secs(3600),
            EvictionStrategy::Lru,
        )
        .compressed()]);
        config.compression.min_size_bytes = 1024;
        let cache = StrataCache::new(config).unwrap();

        let value = doc(1, 64 * 1024);
        cache.set("k", &value, SetOptions::default()).unwrap();

        let stats = cache.stats();
        assert!(stats.total_resident_bytes < 64 * 1024);

        let got: Option<Document> = cache.get("k").unwrap();
        assert_eq!(got, Some(value));
    }

    #[test]
    fn test_tiny_values_skip_compression() {
        let cache = StrataCache::new(CacheConfig::with_layers(vec![layer(
            "packed",
            1024 * 1024,
            Duration::from_secs(3600),
            EvictionStrategy::Lru,
        )
        .compressed()]))
        .unwrap();

        cache.set("k", &doc(1, 20), SetOptions::default()).unwrap();
        let got: Option<Document> = cache.get("k").unwrap();
        assert!(got.is_some());
    }

    #[test]
    fn test_encrypted_layer_roundtrip() {
        let mut config = CacheConfig::with_layers(vec![layer(
            "vault",
            8 * 1024 * 1024,
            Duration::from_secs(3600),
            EvictionStrategy::Lru,
        )
        .encrypted()]);
        config.encryption.min_size_bytes = 64;
        let cache = StrataCache::new(config).unwrap();

        let value = doc(1, 4096);
        cache.set("secret", &value, SetOptions::default()).unwrap();
        let got: Option<Document> = cache.get("secret").unwrap();
        assert_eq!(got, Some(value));
    }

    #[test]
    fn test_compressed_and_encrypted_roundtrip() {
        let mut config = CacheConfig::with_layers(vec![layer(
            "cold",
            8 * 1024 * 1024,
            Duration::from_secs(3600),
            EvictionStrategy::Ttl,
        )
        .compressed()
        .encrypted()]);
        config.compression.min_size_bytes = 256;
        config.encryption.min_size_bytes = 256;
        let cache = StrataCache::new(config).unwrap();

        let value = doc(1, 32 * 1024);
        cache.set("k", &value, SetOptions::default()).unwrap();
        let got: Option<Document> = cache.get("k").unwrap();
        assert_eq!(got, Some(value));
    }

    #[test]
    fn test_sensitive_content_sealed_below_size_threshold() {
        let cache = StrataCache::new(CacheConfig::with_layers(vec![layer(
            "vault",
            1024 * 1024,
            Duration::from_secs(3600),
            EvictionStrategy::Lru,
        )
        .encrypted()]))
        .unwrap();

        cache
            .set(
                "api-key",
                &doc(1, 20),
                SetOptions::default().content_type("application/credentials"),
            )
            .unwrap();

        let got: Option<Document> = cache.get("api-key").unwrap();
        assert!(got.is_some());
    }
}

// =============================================================================
// Eviction, Expiry, Capacity
// =============================================================================

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_layer_never_exceeds_capacity() {
        let cache = StrataCache::new(CacheConfig::with_layers(vec![layer(
            "tiny",
            4 * 1024,
            Duration::from_secs(3600),
            EvictionStrategy::Lru,
        )]))
        .unwrap();

        for i in 0..50 {
            cache
                .set(&format!("k{}", i), &doc(i, 200), SetOptions::default())
                .unwrap();
            let stats = cache.stats();
            assert!(stats.total_resident_bytes <= 4 * 1024);
        }

        let stats = cache.stats();
        assert!(stats.layers[0].evictions > 0);
    }

    #[test]
    fn test_oversized_value_is_rejected() {
        let cache = StrataCache::new(CacheConfig::with_layers(vec![layer(
            "tiny",
            512,
            Duration::from_secs(3600),
            EvictionStrategy::Lru,
        )]))
        .unwrap();

        let result = cache.set("huge", &doc(1, 10 * 1024), SetOptions::default());
        assert_matches!(result, Err(Error::EntryTooLarge { size, capacity, .. }) if size > capacity);
    }

    #[test]
    fn test_expired_entry_misses() {
        let cache = StrataCache::new(CacheConfig::with_layers(vec![layer(
            "ephemeral",
            1024 * 1024,
            Duration::from_millis(30),
            EvictionStrategy::Lru,
        )]))
        .unwrap();

        cache.set("k", &doc(1, 50), SetOptions::default()).unwrap();
        std::thread::sleep(Duration::from_millis(60));

        let got: Option<Document> = cache.get("k").unwrap();
        assert!(got.is_none());
        assert_eq!(cache.stats().total_resident_bytes, 0);
    }

    #[test]
    fn test_optimize_reports_sweep_counts() {
        let cache = StrataCache::new(CacheConfig::with_layers(vec![layer(
            "ephemeral",
            1024 * 1024,
            Duration::from_millis(30),
            EvictionStrategy::Lru,
        )]))
        .unwrap();

        for i in 0..5 {
            cache
                .set(&format!("k{}", i), &doc(i, 50), SetOptions::default())
                .unwrap();
        }
        std::thread::sleep(Duration::from_millis(60));

        let report = cache.optimize();
        assert_eq!(report.expired, 5);
        assert_eq!(cache.stats().total_resident_bytes, 0);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = StrataCache::with_defaults().unwrap();
        cache.set("a", &doc(1, 50), SetOptions::default()).unwrap();
        cache.set("b", &doc(2, 50), SetOptions::default()).unwrap();

        assert!(cache.delete("a"));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));

        cache.clear();
        assert!(!cache.contains("b"));
        assert_eq!(cache.stats().total_resident_bytes, 0);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let cache = StrataCache::with_defaults().unwrap();
        cache
            .set("k", &doc(1, 50), SetOptions::with_priority(Priority::High))
            .unwrap();
        cache
            .set("k", &doc(2, 50), SetOptions::with_priority(Priority::High))
            .unwrap();

        let got: Option<Document> = cache.get("k").unwrap();
        assert_eq!(got.map(|d| d.id), Some(2));
    }

    #[test]
    fn test_rescale_shrink_respects_floor() {
        let mut config = CacheConfig::with_layers(vec![layer(
            "cold",
            2 * 1024 * 1024,
            Duration::from_secs(3600),
            EvictionStrategy::Lru,
        )]);
        config.scaling.min_samples = 5;
        config.scaling.min_layer_bytes = 2 * 1024 * 1024 - 1024;
        let cache = StrataCache::new(config).unwrap();

        for i in 0..10 {
            let _: Option<Document> = cache.get(&format!("absent-{}", i)).unwrap();
        }

        let report = cache.optimize();
        assert_eq!(report.rescaled.len(), 1);
        assert_eq!(report.rescaled[0].to_bytes, 2 * 1024 * 1024 - 1024);
    }
}

// =============================================================================
// Background Maintenance
// =============================================================================

mod maintenance_tests {
    use super::*;

    #[tokio::test]
    async fn test_background_sweep_expires_entries() {
        init_tracing();
        let mut config = CacheConfig::with_layers(vec![layer(
            "ephemeral",
            1024 * 1024,
            Duration::from_millis(20),
            EvictionStrategy::Lru,
        )]);
        config.maintenance = MaintenanceConfig {
            sweep_interval: Duration::from_millis(25),
            rescale_interval: Duration::from_secs(3600),
        };
        let cache = Arc::new(StrataCache::new(config).unwrap());

        cache.set("k", &doc(1, 50), SetOptions::default()).unwrap();
        let handle = MaintenanceHandle::spawn(cache.clone());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.stats().total_resident_bytes, 0);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_clean() {
        let cache = Arc::new(StrataCache::with_defaults().unwrap());
        let handle = MaintenanceHandle::spawn(cache.clone());

        assert!(!handle.is_cancelled());
        handle.shutdown().await;

        // Cache remains fully usable after the task stops
        cache.set("k", &doc(1, 50), SetOptions::default()).unwrap();
        let got: Option<Document> = cache.get("k").unwrap();
        assert!(got.is_some());
    }
}

// =============================================================================
// Concurrency
// =============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_and_writers() {
        init_tracing();
        let cache = Arc::new(
            StrataCache::new(CacheConfig::with_layers(vec![
                layer("fast", 256 * 1024, Duration::from_secs(3600), EvictionStrategy::Lru),
                layer("slow", 1024 * 1024, Duration::from_secs(3600), EvictionStrategy::Lfu),
            ]))
            .unwrap(),
        );

        let mut tasks = tokio::task::JoinSet::new();
        for worker in 0..8u64 {
            let cache = cache.clone();
            tasks.spawn(async move {
                for i in 0..100u64 {
                    let key = format!("k{}", (worker * 31 + i) % 40);
                    if i % 3 == 0 {
                        cache.set(&key, &doc(i, 100), SetOptions::default()).unwrap();
                    } else {
                        let _: Option<Document> = cache.get(&key).unwrap();
                    }
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        // Accounting stayed exact under contention
        let stats = cache.stats();
        assert!(stats.total_resident_bytes <= stats.total_capacity_bytes);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_same_key() {
        let cache = Arc::new(StrataCache::with_defaults().unwrap());

        let mut tasks = tokio::task::JoinSet::new();
        for worker in 0..8u64 {
            let cache = cache.clone();
            tasks.spawn(async move {
                for i in 0..50u64 {
                    cache
                        .set(
                            "contended",
                            &doc(worker * 1000 + i, 100),
                            SetOptions::with_priority(Priority::High),
                        )
                        .unwrap();
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        // Exactly one winner, and it deserializes cleanly
        let got: Option<Document> = cache.get("contended").unwrap();
        assert!(got.is_some());
        let stats = cache.stats();
        let total_entries: usize = stats.layers.iter().map(|l| l.entries).sum();
        assert_eq!(total_entries, 1);
    }
}

// =============================================================================
// Property Tests
// =============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip_any_string(body in ".{0,512}") {
            let cache = StrataCache::with_defaults().unwrap();
            cache.set("k", &body, SetOptions::default()).unwrap();
            let got: Option<String> = cache.get("k").unwrap();
            prop_assert_eq!(got, Some(body));
        }

        #[test]
        fn prop_roundtrip_through_compressed_layer(body in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let mut config = CacheConfig::with_layers(vec![LayerConfig::new(
                "packed",
                8 * 1024 * 1024,
                Duration::from_secs(3600),
                EvictionStrategy::Lru,
            )
            .compressed()]);
            config.compression.min_size_bytes = 64;
            let cache = StrataCache::new(config).unwrap();

            cache.set("k", &body, SetOptions::default()).unwrap();
            let got: Option<Vec<u8>> = cache.get("k").unwrap();
            prop_assert_eq!(got, Some(body));
        }

        #[test]
        fn prop_admission_always_picks_a_valid_layer(
            size in 0u64..200_000_000,
            priority in prop_oneof![
                Just(Priority::High),
                Just(Priority::Normal),
                Just(Priority::Low),
            ],
            layer_count in 1usize..6,
        ) {
            let policy = stratacache::AdmissionPolicy::default();
            let index = policy.target_index(layer_count, size, priority);
            prop_assert!(index < layer_count);
        }
    }
}
