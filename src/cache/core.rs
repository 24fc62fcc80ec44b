use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::block::BlockBacking;
use crate::errors::{CacheError, MultiError};

use super::config::BlocksCacheConfig;
use super::entry::{Entry, EntryState};
use super::eviction::{evict_to_soft_limit, sweep_expired};
use super::index::RecencyIndex;
use super::metrics::{CacheMetrics, CacheMetricsSnapshot};
use super::reaper;

struct Shared<V: BlockBacking> {
    cfg: BlocksCacheConfig,
    index: Mutex<RecencyIndex<V>>,
    metrics: Arc<CacheMetrics>,
    reaper_tx: Mutex<Option<mpsc::Sender<Arc<Entry<V>>>>>,
    shutdown: CancellationToken,
}

/// Size-and-TTL bounded cache of on-disk block directories.
///
/// Lookups hand out a reference-counted value; callers must pair every
/// successful `get` (and every `put_inc`) with a `release`. Evicted entries
/// keep their backing directory on disk until the reaper observes quiescence.
///
/// One mutex guards the key map, the recency list, and the byte accounting;
/// no I/O happens under it. Directory unlinks run on a dedicated reaper task.
pub struct BlocksCache<V: BlockBacking> {
    shared: Arc<Shared<V>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<V: BlockBacking> BlocksCache<V> {
    /// Validate the configuration and start the cache. An enabled cache
    /// spawns its purge and reaper tasks, so this must be called from within
    /// a Tokio runtime.
    ///
    /// # Errors
    /// Returns `CacheError::Config` when validation rejects the configuration.
    pub fn new(cfg: BlocksCacheConfig) -> Result<Self, CacheError> {
        cfg.validate()?;
        let enabled = cfg.enabled;
        let shared = Arc::new(Shared {
            cfg,
            index: Mutex::new(RecencyIndex::new()),
            metrics: Arc::new(CacheMetrics::default()),
            reaper_tx: Mutex::new(None),
            shutdown: CancellationToken::new(),
        });
        let cache = Self { shared, tasks: Mutex::new(Vec::new()) };
        if enabled {
            let (tx, rx) = mpsc::channel(reaper::QUEUE_DEPTH);
            *cache.shared.reaper_tx.lock() = Some(tx);
            let reap = tokio::spawn(reaper::run(rx, Arc::clone(&cache.shared.metrics)));
            let purge = tokio::spawn(purge_loop(Arc::clone(&cache.shared)));
            cache.tasks.lock().extend([reap, purge]);
        }
        Ok(cache)
    }

    /// Admit a new entry with no holders.
    ///
    /// # Errors
    /// `Cancelled`, `AlreadyExists`, or `ExceedsHardLimit` per the admission
    /// rules.
    pub fn put(&self, ctx: &CancellationToken, key: &str, value: V) -> Result<(), CacheError> {
        self.put_with_refs(ctx, key, value, 0)
    }

    /// Admit a new entry with the caller already holding one reference,
    /// avoiding the put-then-get race.
    ///
    /// # Errors
    /// Same as [`BlocksCache::put`].
    pub fn put_inc(&self, ctx: &CancellationToken, key: &str, value: V) -> Result<(), CacheError> {
        self.put_with_refs(ctx, key, value, 1)
    }

    /// Admit several entries pairwise. Each insertion is attempted
    /// independently; nothing is rolled back on a later failure.
    ///
    /// # Errors
    /// `Cancelled` when the context is cancelled up front, otherwise
    /// `CacheError::Multi` with the per-key failures in input order.
    pub fn put_many(
        &self,
        ctx: &CancellationToken,
        keys: &[String],
        values: Vec<V>,
    ) -> Result<(), CacheError> {
        if !self.shared.cfg.enabled {
            return Ok(());
        }
        if ctx.is_cancelled() || self.shared.shutdown.is_cancelled() {
            self.shared.metrics.failures_cancelled.fetch_add(1, Ordering::Relaxed);
            return Err(CacheError::Cancelled);
        }
        debug_assert_eq!(keys.len(), values.len());

        let mut failures = MultiError::default();
        let mut pending_removals = Vec::new();
        {
            let mut index = self.shared.index.lock();
            for (key, value) in keys.iter().zip(values) {
                match self.admit(&mut index, key, value, 0) {
                    Ok(mut evicted) => pending_removals.append(&mut evicted),
                    Err(err) => failures.push(err),
                }
            }
            self.shared.metrics.record_usage(index.len(), index.current_bytes());
        }
        self.schedule_removals(pending_removals);
        failures.into_result()
    }

    /// Look up a resident entry. A hit takes a reference, refreshes the
    /// access time, and promotes the entry to most recently used; the caller
    /// must `release` the key when done.
    pub fn get(&self, ctx: &CancellationToken, key: &str) -> Option<V> {
        if !self.shared.cfg.enabled {
            return None;
        }
        if ctx.is_cancelled() || self.shared.shutdown.is_cancelled() {
            return None;
        }
        let mut index = self.shared.index.lock();
        let Some(entry) = index.get(key) else {
            self.shared.metrics.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        let entry = Arc::clone(entry);
        entry.acquire();
        entry.touch(Instant::now());
        index.move_to_front(key);
        self.shared.metrics.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value().clone())
    }

    /// Drop one reference on `key`. Releasing a key that is no longer
    /// resident is a no-op, so late releases after eviction are benign.
    ///
    /// # Errors
    /// `UnbalancedRelease` when the count would go below zero; the count is
    /// clamped at zero.
    pub fn release(&self, ctx: &CancellationToken, key: &str) -> Result<(), CacheError> {
        if !self.shared.cfg.enabled || self.shared.shutdown.is_cancelled() {
            return Ok(());
        }
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let index = self.shared.index.lock();
        let Some(entry) = index.get(key) else { return Ok(()) };
        match entry.release() {
            Ok(_) => {
                self.shared.metrics.releases.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(()) => {
                self.shared.metrics.unbalanced_releases.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::UnbalancedRelease(key.to_string()))
            }
        }
    }

    /// Shut the cache down: stop the TTL sweep, close the reaper queue, and
    /// wait for pending directory removals to finish or time out. Idempotent;
    /// later operations fail fast or are no-ops.
    pub async fn stop(&self) {
        self.shared.shutdown.cancel();
        self.shared.reaper_tx.lock().take();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.index.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn current_bytes(&self) -> u64 {
        self.shared.index.lock().current_bytes()
    }

    /// Resident keys in recency order, most recently used first.
    #[must_use]
    pub fn recency_keys(&self) -> Vec<String> {
        self.shared.index.lock().keys_by_recency()
    }

    /// Reference count of a resident entry.
    #[must_use]
    pub fn ref_count(&self, key: &str) -> Option<i32> {
        self.shared.index.lock().get(key).map(|entry| entry.ref_count())
    }

    #[must_use]
    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    fn put_with_refs(
        &self,
        ctx: &CancellationToken,
        key: &str,
        value: V,
        initial_refs: i32,
    ) -> Result<(), CacheError> {
        if !self.shared.cfg.enabled {
            return Ok(());
        }
        if ctx.is_cancelled() || self.shared.shutdown.is_cancelled() {
            self.shared.metrics.failures_cancelled.fetch_add(1, Ordering::Relaxed);
            return Err(CacheError::Cancelled);
        }
        let pending_removals = {
            let mut index = self.shared.index.lock();
            let evicted = self.admit(&mut index, key, value, initial_refs)?;
            self.shared.metrics.record_usage(index.len(), index.current_bytes());
            evicted
        };
        self.schedule_removals(pending_removals);
        Ok(())
    }

    /// Admission under the index lock: limit checks, insert at the front,
    /// then an LRU pass when the soft limit was crossed.
    fn admit(
        &self,
        index: &mut RecencyIndex<V>,
        key: &str,
        value: V,
        initial_refs: i32,
    ) -> Result<Vec<Arc<Entry<V>>>, CacheError> {
        let metrics = &self.shared.metrics;
        let size = value.size();
        if size > self.shared.cfg.hard_limit {
            metrics.failures_full.fetch_add(1, Ordering::Relaxed);
            return Err(CacheError::ExceedsHardLimit(key.to_string()));
        }
        if index.contains(key) {
            metrics.failures_already_exists.fetch_add(1, Ordering::Relaxed);
            return Err(CacheError::AlreadyExists(key.to_string()));
        }
        // Resident bytes must never exceed the hard limit; admissions that
        // would cross it fail fast instead of waiting for space.
        if index.current_bytes() + size > self.shared.cfg.hard_limit {
            metrics.failures_full.fetch_add(1, Ordering::Relaxed);
            return Err(CacheError::ExceedsHardLimit(key.to_string()));
        }

        index.push_front(Arc::new(Entry::new(key, value, initial_refs)));
        metrics.admissions.fetch_add(1, Ordering::Relaxed);

        let mut evicted = Vec::new();
        if index.current_bytes() > self.shared.cfg.soft_limit {
            evicted = evict_to_soft_limit(index, self.shared.cfg.soft_limit);
            metrics.evictions_lru.fetch_add(evicted.len() as u64, Ordering::Relaxed);
        }
        Ok(evicted)
    }

    fn schedule_removals(&self, evicted: Vec<Arc<Entry<V>>>) {
        schedule_removals(&self.shared, evicted);
    }
}

impl<V: BlockBacking> Drop for BlocksCache<V> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
        self.shared.reaper_tx.lock().take();
    }
}

/// Hand evicted entries to the reaper. If the queue is gone or full the
/// directory is leaked: a warning plus the timeout counter, never a blocked
/// caller.
fn schedule_removals<V: BlockBacking>(shared: &Shared<V>, evicted: Vec<Arc<Entry<V>>>) {
    if evicted.is_empty() {
        return;
    }
    let guard = shared.reaper_tx.lock();
    for entry in evicted {
        let rejected = match guard.as_ref() {
            Some(tx) => match tx.try_send(entry) {
                Ok(()) => None,
                Err(TrySendError::Full(entry) | TrySendError::Closed(entry)) => Some(entry),
            },
            None => Some(entry),
        };
        if let Some(entry) = rejected {
            entry.set_state(EntryState::Abandoned);
            shared.metrics.reap_timeouts.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "reaper unavailable; leaking block directory {}",
                entry.value().path().display()
            );
        }
    }
}

async fn purge_loop<V: BlockBacking>(shared: Arc<Shared<V>>) {
    let mut ticker = tokio::time::interval(shared.cfg.effective_purge_interval());
    loop {
        tokio::select! {
            () = shared.shutdown.cancelled() => return,
            _ = ticker.tick() => {
                let evicted = {
                    let mut index = shared.index.lock();
                    let evicted = sweep_expired(&mut index, shared.cfg.ttl, Instant::now());
                    shared.metrics.evictions_ttl.fetch_add(evicted.len() as u64, Ordering::Relaxed);
                    shared.metrics.record_usage(index.len(), index.current_bytes());
                    evicted
                };
                if !evicted.is_empty() {
                    log::debug!("ttl sweep evicted {} entries", evicted.len());
                }
                schedule_removals(&shared, evicted);
            }
        }
    }
}
