#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use std::time::Duration;

use blockscache::{BlockDirectory, BlocksCache, BlocksCacheConfig};
use tokio_util::sync::CancellationToken;

#[derive(Arbitrary, Debug)]
enum Op {
    Put { key: u8, size: u16 },
    PutInc { key: u8, size: u16 },
    Get { key: u8 },
    Release { key: u8 },
}

fuzz_target!(|ops: Vec<Op>| {
    if ops.len() > 256 {
        return;
    }
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    rt.block_on(async {
        let cfg = BlocksCacheConfig {
            enabled: true,
            ttl: Duration::from_secs(3600),
            soft_limit: 1 << 12,
            hard_limit: 1 << 13,
            purge_interval: Duration::from_secs(3600),
        };
        let cache = BlocksCache::new(cfg).expect("valid config");
        let ctx = CancellationToken::new();
        for op in ops {
            match op {
                Op::Put { key, size } => {
                    let key = format!("k{key}");
                    let _ = cache.put(&ctx, &key, BlockDirectory::new(&key, u64::from(size)));
                }
                Op::PutInc { key, size } => {
                    let key = format!("k{key}");
                    let _ = cache.put_inc(&ctx, &key, BlockDirectory::new(&key, u64::from(size)));
                }
                Op::Get { key } => {
                    let _ = cache.get(&ctx, &format!("k{key}"));
                }
                Op::Release { key } => {
                    let _ = cache.release(&ctx, &format!("k{key}"));
                }
            }
            assert!(cache.current_bytes() <= 1 << 13);
            assert_eq!(cache.recency_keys().len(), cache.len());
        }
        cache.stop().await;
    });
});
