use std::collections::HashSet;
use std::time::Duration;

use blockscache::{BlockDirectory, BlocksCache, BlocksCacheConfig};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

const HARD_LIMIT: u64 = 48;

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u64),
    PutInc(u8, u64),
    Get(u8),
    Release(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6, 1u64..16).prop_map(|(k, s)| Op::Put(k, s)),
        (0u8..6, 1u64..16).prop_map(|(k, s)| Op::PutInc(k, s)),
        (0u8..6).prop_map(Op::Get),
        (0u8..6).prop_map(Op::Release),
    ]
}

fn config() -> BlocksCacheConfig {
    BlocksCacheConfig {
        enabled: true,
        ttl: Duration::from_secs(3600),
        soft_limit: 32,
        hard_limit: HARD_LIMIT,
        purge_interval: Duration::from_secs(3600),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap()
}

proptest! {
    #[test]
    fn random_op_sequences_hold_the_cache_invariants(
        ops in proptest::collection::vec(op_strategy(), 1..64)
    ) {
        runtime().block_on(async {
            let cache = BlocksCache::new(config()).unwrap();
            let ctx = CancellationToken::new();

            for op in ops {
                match op {
                    Op::Put(k, size) => {
                        let key = format!("k{k}");
                        let _ = cache.put(&ctx, &key, BlockDirectory::new(&key, size));
                    }
                    Op::PutInc(k, size) => {
                        let key = format!("k{k}");
                        let _ = cache.put_inc(&ctx, &key, BlockDirectory::new(&key, size));
                    }
                    Op::Get(k) => {
                        let _ = cache.get(&ctx, &format!("k{k}"));
                    }
                    Op::Release(k) => {
                        let _ = cache.release(&ctx, &format!("k{k}"));
                    }
                }

                prop_assert!(cache.current_bytes() <= HARD_LIMIT);

                let keys = cache.recency_keys();
                prop_assert_eq!(keys.len(), cache.len());
                let unique: HashSet<&String> = keys.iter().collect();
                prop_assert_eq!(unique.len(), keys.len());
                for key in &keys {
                    prop_assert!(cache.ref_count(key).unwrap_or(0) >= 0);
                }
            }

            cache.stop().await;
            Ok(())
        })?;
    }

    #[test]
    fn balanced_get_release_round_trips(n in 1usize..8) {
        runtime().block_on(async {
            let cache = BlocksCache::new(config()).unwrap();
            let ctx = CancellationToken::new();

            cache.put_inc(&ctx, "a", BlockDirectory::new("a", 4)).unwrap();
            for _ in 0..n {
                prop_assert!(cache.get(&ctx, "a").is_some());
            }
            for _ in 0..n {
                cache.release(&ctx, "a").unwrap();
            }
            prop_assert_eq!(cache.ref_count("a"), Some(1));

            cache.stop().await;
            Ok(())
        })?;
    }
}
