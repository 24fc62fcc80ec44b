use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use blockscache::{BlockDirectory, BlocksCache, BlocksCacheConfig};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn config() -> BlocksCacheConfig {
    BlocksCacheConfig {
        enabled: true,
        ttl: Duration::from_secs(3600),
        soft_limit: 10,
        hard_limit: 30,
        purge_interval: Duration::from_secs(60),
    }
}

/// Materialize a real block directory with one file inside.
fn block_dir(parent: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = parent.path().join(name);
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("bloom"), b"0123456789").unwrap();
    path
}

#[tokio::test]
async fn eviction_removes_the_backing_directory() {
    let parent = tempfile::tempdir().unwrap();
    let path = block_dir(&parent, "block-a");
    let cache = BlocksCache::new(config()).unwrap();
    let ctx = CancellationToken::new();

    let value = BlockDirectory::new(&path, 8)
        .with_active_check_interval(Duration::from_millis(10))
        .with_remove_timeout(Duration::from_secs(2));
    cache.put(&ctx, "a", value).unwrap();

    // crossing the soft limit evicts "a"
    cache.put(&ctx, "b", BlockDirectory::new(parent.path().join("block-b"), 8)).unwrap();
    assert!(cache.get(&ctx, "a").is_none());

    sleep(Duration::from_millis(200)).await;
    assert!(!path.exists());
    assert_eq!(cache.metrics_snapshot().reaps, 1);

    cache.stop().await;
}

#[tokio::test]
async fn directory_survives_while_a_querier_is_active() {
    let parent = tempfile::tempdir().unwrap();
    let path = block_dir(&parent, "block-a");
    let cache = BlocksCache::new(config()).unwrap();
    let ctx = CancellationToken::new();

    let value = BlockDirectory::new(&path, 8)
        .with_active_check_interval(Duration::from_millis(10))
        .with_remove_timeout(Duration::from_secs(5));
    cache.put(&ctx, "a", value).unwrap();

    let dir = cache.get(&ctx, "a").unwrap();
    let guard = dir.querier();
    cache.release(&ctx, "a").unwrap();

    cache.put(&ctx, "b", BlockDirectory::new(parent.path().join("block-b"), 8)).unwrap();
    assert!(cache.get(&ctx, "a").is_none());

    sleep(Duration::from_millis(150)).await;
    assert!(path.exists());

    drop(guard);
    sleep(Duration::from_millis(200)).await;
    assert!(!path.exists());

    cache.stop().await;
}

#[tokio::test]
async fn reaper_gives_up_after_the_remove_timeout() {
    let parent = tempfile::tempdir().unwrap();
    let path = block_dir(&parent, "block-a");
    let cache = BlocksCache::new(config()).unwrap();
    let ctx = CancellationToken::new();

    let value = BlockDirectory::new(&path, 8)
        .with_active_check_interval(Duration::from_millis(10))
        .with_remove_timeout(Duration::from_millis(100));
    cache.put(&ctx, "a", value).unwrap();

    let dir = cache.get(&ctx, "a").unwrap();
    let guard = dir.querier();
    cache.release(&ctx, "a").unwrap();

    cache.put(&ctx, "b", BlockDirectory::new(parent.path().join("block-b"), 8)).unwrap();

    sleep(Duration::from_millis(300)).await;
    assert!(path.exists());
    assert_eq!(cache.metrics_snapshot().reap_timeouts, 1);
    assert_eq!(cache.metrics_snapshot().reaps, 0);

    drop(guard);
    cache.stop().await;
}

#[tokio::test]
async fn stop_drains_pending_removals() {
    let parent = tempfile::tempdir().unwrap();
    let path = block_dir(&parent, "block-a");
    let cache = BlocksCache::new(config()).unwrap();
    let ctx = CancellationToken::new();

    let value = BlockDirectory::new(&path, 8)
        .with_active_check_interval(Duration::from_millis(10))
        .with_remove_timeout(Duration::from_secs(2));
    cache.put(&ctx, "a", value).unwrap();
    cache.put(&ctx, "b", BlockDirectory::new(parent.path().join("block-b"), 8)).unwrap();

    cache.stop().await;
    assert!(!path.exists());
}
