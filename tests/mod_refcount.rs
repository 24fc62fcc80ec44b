use std::time::Duration;

use blockscache::{BlockDirectory, BlocksCache, BlocksCacheConfig, CacheError};
use tokio_util::sync::CancellationToken;

fn cache_value(path: &str, size: u64) -> BlockDirectory {
    BlockDirectory::new(path, size)
}

fn config() -> BlocksCacheConfig {
    BlocksCacheConfig {
        enabled: true,
        ttl: Duration::from_secs(3600),
        soft_limit: 10,
        hard_limit: 20,
        purge_interval: Duration::from_secs(60),
    }
}

#[tokio::test]
async fn references_are_counted_per_get_and_release() {
    let cache = BlocksCache::new(config()).unwrap();
    let ctx = CancellationToken::new();

    cache.put_inc(&ctx, "a", cache_value("a", 5)).unwrap();
    assert_eq!(cache.ref_count("a"), Some(1));

    let _ = cache.get(&ctx, "a");
    assert_eq!(cache.ref_count("a"), Some(2));

    cache.release(&ctx, "a").unwrap();
    assert_eq!(cache.ref_count("a"), Some(1));

    cache.release(&ctx, "a").unwrap();
    assert_eq!(cache.ref_count("a"), Some(0));

    cache.stop().await;
}

#[tokio::test]
async fn release_past_zero_is_reported_and_clamped() {
    let cache = BlocksCache::new(config()).unwrap();
    let ctx = CancellationToken::new();

    cache.put(&ctx, "a", cache_value("a", 5)).unwrap();

    let err = cache.release(&ctx, "a").unwrap_err();
    assert!(matches!(err, CacheError::UnbalancedRelease(_)));
    assert_eq!(cache.ref_count("a"), Some(0));

    // the entry itself is untouched
    assert!(cache.get(&ctx, "a").is_some());
    assert_eq!(cache.ref_count("a"), Some(1));

    let snapshot = cache.metrics_snapshot();
    assert_eq!(snapshot.unbalanced_releases, 1);

    cache.stop().await;
}

#[tokio::test]
async fn releasing_an_unknown_key_is_benign() {
    let cache: BlocksCache<BlockDirectory> = BlocksCache::new(config()).unwrap();
    let ctx = CancellationToken::new();

    cache.release(&ctx, "never-put").unwrap();

    cache.stop().await;
}

#[tokio::test]
async fn balanced_gets_and_releases_leave_the_count_unchanged() {
    let cache = BlocksCache::new(config()).unwrap();
    let ctx = CancellationToken::new();

    cache.put_inc(&ctx, "a", cache_value("a", 5)).unwrap();
    for _ in 0..4 {
        assert!(cache.get(&ctx, "a").is_some());
    }
    for _ in 0..4 {
        cache.release(&ctx, "a").unwrap();
    }
    assert_eq!(cache.ref_count("a"), Some(1));

    cache.stop().await;
}

#[tokio::test]
async fn put_inc_rejects_duplicates_too() {
    let cache = BlocksCache::new(config()).unwrap();
    let ctx = CancellationToken::new();

    cache.put_inc(&ctx, "a", cache_value("a", 5)).unwrap();
    let err = cache.put_inc(&ctx, "a", cache_value("a", 5)).unwrap_err();
    assert_eq!(err.to_string(), "entry already exists: a");
    assert_eq!(cache.ref_count("a"), Some(1));

    cache.stop().await;
}
