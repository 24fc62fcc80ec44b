use std::sync::atomic::{AtomicU64, Ordering};

/// Counters and gauges for observing cache behavior.
#[derive(Default)]
pub struct CacheMetrics {
    pub entries: AtomicU64,
    pub bytes: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub admissions: AtomicU64,
    pub failures_already_exists: AtomicU64,
    pub failures_full: AtomicU64,
    pub failures_cancelled: AtomicU64,
    pub evictions_lru: AtomicU64,
    pub evictions_ttl: AtomicU64,
    pub releases: AtomicU64,
    pub unbalanced_releases: AtomicU64,
    pub reaps: AtomicU64,
    pub reap_timeouts: AtomicU64,
}

impl CacheMetrics {
    pub(crate) fn record_usage(&self, entries: usize, bytes: u64) {
        self.entries.store(entries as u64, Ordering::Relaxed);
        self.bytes.store(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            entries: self.entries.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            admissions: self.admissions.load(Ordering::Relaxed),
            failures_already_exists: self.failures_already_exists.load(Ordering::Relaxed),
            failures_full: self.failures_full.load(Ordering::Relaxed),
            failures_cancelled: self.failures_cancelled.load(Ordering::Relaxed),
            evictions_lru: self.evictions_lru.load(Ordering::Relaxed),
            evictions_ttl: self.evictions_ttl.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            unbalanced_releases: self.unbalanced_releases.load(Ordering::Relaxed),
            reaps: self.reaps.load(Ordering::Relaxed),
            reap_timeouts: self.reap_timeouts.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheMetricsSnapshot {
    pub entries: u64,
    pub bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub admissions: u64,
    pub failures_already_exists: u64,
    pub failures_full: u64,
    pub failures_cancelled: u64,
    pub evictions_lru: u64,
    pub evictions_ttl: u64,
    pub releases: u64,
    pub unbalanced_releases: u64,
    pub reaps: u64,
    pub reap_timeouts: u64,
}
