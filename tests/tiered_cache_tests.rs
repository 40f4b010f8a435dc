//! Integration Tests for the Tiered Cache
//!
//! Exercises the library through its public API: tier-1 eviction and expiry,
//! the tier cascade, batching, warmup and the manager.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tiered_cache::cache::{json_size_estimator, NO_EXPIRY};
use tiered_cache::facade::CacheManager;
use tiered_cache::tiered::{loader_fn, InMemoryRemote, Loader, RemoteTier, TieredCache};
use tiered_cache::warmer::{CacheWarmer, NamespaceWarmup, RefreshPolicy, WarmupStrategy};
use tiered_cache::{BoundedStore, CacheError, Config, StoreLimits};

// == Helper Functions ==

fn store(max_items: usize) -> BoundedStore<String> {
    BoundedStore::new(StoreLimits::new(max_items, 0), json_size_estimator())
}

fn remote() -> Arc<InMemoryRemote<String>> {
    Arc::new(InMemoryRemote::new(json_size_estimator()))
}

fn as_remote(remote: &Arc<InMemoryRemote<String>>) -> Option<Arc<dyn RemoteTier<String>>> {
    Some(remote.clone() as Arc<dyn RemoteTier<String>>)
}

/// Resolves `db_*` keys, counting every call.
fn database_loader(calls: Arc<AtomicUsize>) -> Arc<dyn Loader<String>> {
    loader_fn(move |key: String| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let value = key.starts_with("db_").then(|| format!("row:{}", key));
            Ok::<_, anyhow::Error>(value)
        }
    })
}

/// Fails the test if the cascade ever reaches tier 3.
fn unreachable_loader() -> Arc<dyn Loader<String>> {
    loader_fn(|key: String| async move {
        Err::<Option<String>, _>(anyhow::anyhow!("loader must not be called for {}", key))
    })
}

// == Tier-1 Store ==

#[test]
fn test_lru_evicts_least_recently_used() {
    let store = store(3);
    store.set("k1", "v1".to_string(), NO_EXPIRY).unwrap();
    store.set("k2", "v2".to_string(), NO_EXPIRY).unwrap();
    store.set("k3", "v3".to_string(), NO_EXPIRY).unwrap();

    store.get("k1").unwrap();
    store.set("k4", "v4".to_string(), NO_EXPIRY).unwrap();

    assert!(matches!(store.get("k2"), Err(CacheError::NotFound(_))));
    assert!(store.get("k1").is_ok());
    assert!(store.get("k3").is_ok());
    assert!(store.get("k4").is_ok());
    assert_eq!(store.stats().evictions, 1);
}

#[tokio::test]
async fn test_ttl_reports_expired_once_then_not_found() {
    let store = store(10);
    store
        .set("short", "lived".to_string(), Duration::from_millis(100))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(matches!(store.get("short"), Err(CacheError::Expired(_))));
    assert!(matches!(store.get("short"), Err(CacheError::NotFound(_))));
    assert_eq!(store.stats().expirations, 1);
}

// == Tier Cascade ==

#[tokio::test]
async fn test_tier2_hit_promotes_without_calling_loader() {
    let remote = remote();
    remote.seed("k", "from-remote".to_string());
    let cache = TieredCache::new(store(10), as_remote(&remote), Some(unreachable_loader()));

    assert_eq!(cache.get("k").await.unwrap(), "from-remote");
    assert_eq!(cache.get("k").await.unwrap(), "from-remote");

    let stats = cache.stats();
    assert_eq!(stats.l2_hits, 1);
    assert_eq!(stats.l1_hits, 1);
    assert_eq!(stats.loader_errors, 0);
    assert_eq!(remote.get_calls(), 1);
}

#[tokio::test]
async fn test_loader_fallback_then_tier1_hit() {
    let remote = remote();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TieredCache::new(
        store(10),
        as_remote(&remote),
        Some(database_loader(calls.clone())),
    );

    assert_eq!(cache.get("db_key1").await.unwrap(), "row:db_key1");
    assert_eq!(cache.get("db_key1").await.unwrap(), "row:db_key1");

    let stats = cache.stats();
    assert_eq!(stats.l3_hits, 1);
    assert_eq!(stats.l1_hits, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // Loaded value also populated tier 2
    assert_eq!(remote.peek("db_key1").as_deref(), Some("row:db_key1"));
}

#[tokio::test]
async fn test_full_miss_is_not_found() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TieredCache::new(store(10), None, Some(database_loader(calls)));

    assert!(matches!(
        cache.get("unknown").await,
        Err(CacheError::NotFound(_))
    ));
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn test_hit_rate_arithmetic() {
    let cache = TieredCache::new(store(10), None, None);
    let empty = cache.stats();
    assert_eq!(empty.hit_rate, 0.0);
    assert_eq!(empty.l1_hit_rate, 0.0);

    cache.set("a", "1".to_string(), NO_EXPIRY).await.unwrap();
    for _ in 0..3 {
        cache.get("a").await.unwrap();
    }
    cache.get("missing").await.unwrap_err();

    let stats = cache.stats();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.hit_rate, 0.75);
    assert_eq!(stats.l1_hit_rate, 0.75);
}

#[tokio::test]
async fn test_batch_get_minimizes_outer_tier_calls() {
    let remote = remote();
    remote.seed("remote_1", "r1".to_string());
    remote.seed("remote_2", "r2".to_string());
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = TieredCache::new(
        store(10),
        as_remote(&remote),
        Some(database_loader(calls.clone())),
    );
    cache.l1().set("local", "l".to_string(), NO_EXPIRY).unwrap();

    let found = cache
        .get_multi(&["local", "remote_1", "remote_2", "db_x", "nowhere"])
        .await;

    assert_eq!(found.len(), 4);
    assert_eq!(found["local"], "l");
    assert_eq!(found["remote_2"], "r2");
    assert_eq!(found["db_x"], "row:db_x");
    assert!(!found.contains_key("nowhere"));

    // One batched tier-2 round-trip, loader only for the two leftovers
    assert_eq!(remote.batch_get_calls(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stats = cache.stats();
    assert_eq!(stats.l1_hits, 1);
    assert_eq!(stats.l2_hits, 2);
    assert_eq!(stats.l3_hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_batch_get_all_local_skips_outer_tiers() {
    let remote = remote();
    let cache = TieredCache::new(store(10), as_remote(&remote), Some(unreachable_loader()));
    cache.l1().set("a", "1".to_string(), NO_EXPIRY).unwrap();
    cache.l1().set("b", "2".to_string(), NO_EXPIRY).unwrap();

    let found = cache.get_multi(&["a", "b"]).await;

    assert_eq!(found.len(), 2);
    assert_eq!(remote.batch_get_calls(), 0);
    assert_eq!(remote.get_calls(), 0);
}

#[tokio::test]
async fn test_remote_outage_is_absorbed() {
    let remote = remote();
    remote.seed("k", "stale".to_string());
    remote.set_available(false);
    let cache = TieredCache::new(store(10), as_remote(&remote), None);

    cache.set("w", "v".to_string(), NO_EXPIRY).await.unwrap();
    assert!(matches!(cache.get("k").await, Err(CacheError::NotFound(_))));
    assert_eq!(cache.get("w").await.unwrap(), "v");
    assert!(cache.stats().tier2_errors >= 2);
}

// == Warmup ==

#[tokio::test]
async fn test_warmup_aggregates_failures() {
    let cache = Arc::new(TieredCache::new(store(100), None, None));
    let warmer = CacheWarmer::new(cache.clone(), Duration::from_secs(60));

    for i in 0..5 {
        let strategy: Arc<dyn WarmupStrategy<String>> = if i % 2 == 0 {
            Arc::new(NamespaceWarmup::new(
                format!("good-{}", i),
                "warm",
                Duration::from_secs(60),
                RefreshPolicy::Periodic,
                move || async move {
                    Ok::<_, anyhow::Error>(vec![(format!("key-{}", i), format!("value-{}", i))])
                },
            ))
        } else {
            Arc::new(NamespaceWarmup::new(
                format!("bad-{}", i),
                "warm",
                Duration::from_secs(60),
                RefreshPolicy::Periodic,
                move || async move {
                    Err::<Vec<(String, String)>, _>(anyhow::anyhow!("source {} offline", i))
                },
            ))
        };
        warmer.add_strategy(strategy);
    }

    match warmer.warmup().await {
        Err(CacheError::WarmupFailed { failed, total, .. }) => {
            assert_eq!(failed, 2);
            assert_eq!(total, 5);
        }
        other => panic!("expected aggregated failure, got {:?}", other),
    }

    for i in [0, 2, 4] {
        let key = format!("warm:key-{}", i);
        assert_eq!(cache.get(&key).await.unwrap(), format!("value-{}", i));
    }
    assert_eq!(cache.l1().len(), 3);
}

// == Manager ==

#[tokio::test]
async fn test_manager_invalidation_hook() {
    let cache = Arc::new(TieredCache::new(store(100), None, None));
    let manager = CacheManager::new(cache, &Config::default());
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    manager.set_on_invalidate(move |key: &str| {
        assert_eq!(key, "positions:pos-1");
        counter.fetch_add(1, Ordering::SeqCst);
    });

    manager
        .set("positions", "pos-1", "open".to_string(), NO_EXPIRY)
        .await
        .unwrap();
    manager.invalidate_position("pos-1").await.unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(manager.get("positions", "pos-1").await.is_err());
    assert_eq!(manager.stats().invalidations, 1);
}

#[tokio::test]
async fn test_manager_lifecycle_with_remote() {
    let remote = remote();
    let cache = Arc::new(TieredCache::new(store(100), as_remote(&remote), None));
    let config = Config {
        sweep_interval: 1,
        ..Config::default()
    };
    let manager = CacheManager::new(cache, &config);
    manager.add_strategy(Arc::new(NamespaceWarmup::symbol_configs(|| async {
        Ok::<_, anyhow::Error>(vec![("EURUSD".to_string(), "5 digits".to_string())])
    })));

    manager.start().await;

    // Warmup writes through to tier 2
    assert_eq!(remote.peek("symbols:EURUSD").as_deref(), Some("5 digits"));
    assert_eq!(
        manager.get_symbol_config("EURUSD").await.unwrap(),
        "5 digits"
    );

    tokio::time::timeout(Duration::from_secs(1), manager.shutdown())
        .await
        .expect("manager should shut down promptly");
}
