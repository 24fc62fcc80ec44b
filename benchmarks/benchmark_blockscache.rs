use std::time::{Duration, Instant};

use blockscache::{BlockDirectory, BlocksCache, BlocksCacheConfig};
use tokio_util::sync::CancellationToken;

const ENTRIES: usize = 1000;
const READ_ROUNDS: usize = 100;

#[tokio::main]
async fn main() {
    let _ = blockscache::logger::configure_logging(None, Some("warn"), None);

    let cfg = BlocksCacheConfig {
        enabled: true,
        ttl: Duration::from_secs(3600),
        soft_limit: 100 << 20,
        hard_limit: 120 << 20,
        purge_interval: Duration::from_secs(3600),
    };
    let cache = BlocksCache::new(cfg).expect("valid config");
    let ctx = CancellationToken::new();

    let keys: Vec<String> = (0..ENTRIES).map(|i| format!("block-{i:04x}")).collect();

    let started = Instant::now();
    for key in &keys {
        cache
            .put(&ctx, key, BlockDirectory::new(format!("blocks/{key}"), 4 << 10))
            .expect("admission");
    }
    println!("write: {ENTRIES} entries in {:?}", started.elapsed());

    let started = Instant::now();
    let mut hits = 0usize;
    for _ in 0..READ_ROUNDS {
        for key in &keys {
            if cache.get(&ctx, key).is_some() {
                hits += 1;
                let _ = cache.release(&ctx, key);
            }
        }
    }
    println!(
        "read: {} lookups ({hits} hits) in {:?}",
        ENTRIES * READ_ROUNDS,
        started.elapsed()
    );

    cache.stop().await;
}
