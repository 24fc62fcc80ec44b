use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::block::BlockBacking;

use super::entry::{Entry, EntryState};
use super::index::RecencyIndex;

/// Walk the recency list back-to-front, evicting unreferenced entries until
/// resident bytes drop to the soft limit or the list is exhausted. Pinned
/// entries are skipped, not killed. Returns the evicted entries for the
/// reaper.
pub(crate) fn evict_to_soft_limit<V: BlockBacking>(
    index: &mut RecencyIndex<V>,
    soft_limit: u64,
) -> Vec<Arc<Entry<V>>> {
    let mut evicted = Vec::new();
    let mut cursor = index.back();
    while index.current_bytes() > soft_limit {
        let Some(idx) = cursor else { break };
        cursor = index.toward_front(idx);
        let Some(candidate) = index.entry_at(idx).map(Arc::clone) else { continue };
        if candidate.ref_count() > 0 {
            continue;
        }
        index.remove(candidate.key());
        candidate.set_state(EntryState::Evicted);
        evicted.push(candidate);
    }
    evicted
}

/// Evict every unreferenced entry that has outlived `ttl` as of `now`.
/// Expired entries still holding references are left for the next sweep.
pub(crate) fn sweep_expired<V: BlockBacking>(
    index: &mut RecencyIndex<V>,
    ttl: Duration,
    now: Instant,
) -> Vec<Arc<Entry<V>>> {
    let expired: Vec<String> = index
        .entries()
        .filter(|entry| entry.ref_count() == 0 && now.duration_since(entry.created_at()) >= ttl)
        .map(|entry| entry.key().to_string())
        .collect();

    let mut evicted = Vec::with_capacity(expired.len());
    for key in expired {
        if let Some(entry) = index.remove(&key) {
            entry.set_state(EntryState::Evicted);
            evicted.push(entry);
        }
    }
    evicted
}
