use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};

use crate::block::BlockBacking;

use super::entry::{Entry, EntryState};
use super::metrics::CacheMetrics;

pub(crate) const QUEUE_DEPTH: usize = 128;
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Consume evicted entries and unlink their backing directories once
/// quiescent. Runs until the queue is closed, then drains what is still
/// waiting; one slow entry never delays the others.
pub(crate) async fn run<V: BlockBacking>(
    mut rx: mpsc::Receiver<Arc<Entry<V>>>,
    metrics: Arc<CacheMetrics>,
) {
    let mut pending: JoinSet<()> = JoinSet::new();
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(entry) => {
                    pending.spawn(remove_when_quiescent(entry, Arc::clone(&metrics)));
                }
                None => break,
            },
            Some(_) = pending.join_next(), if !pending.is_empty() => {}
        }
    }
    while pending.join_next().await.is_some() {}
}

async fn remove_when_quiescent<V: BlockBacking>(entry: Arc<Entry<V>>, metrics: Arc<CacheMetrics>) {
    let interval = entry.value().active_check_interval().max(MIN_CHECK_INTERVAL);
    let deadline = Instant::now() + entry.value().remove_timeout();
    loop {
        if entry.ref_count() == 0 && entry.value().active_queriers() == 0 {
            entry.set_state(EntryState::Reaped);
            match entry.value().remove_directory() {
                Ok(()) => {
                    metrics.reaps.fetch_add(1, Ordering::Relaxed);
                    log::debug!("removed block directory {}", entry.value().path().display());
                }
                Err(e) => {
                    log::warn!(
                        "failed to remove block directory {}: {e}",
                        entry.value().path().display()
                    );
                }
            }
            return;
        }
        if Instant::now() >= deadline {
            entry.set_state(EntryState::Abandoned);
            metrics.reap_timeouts.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "gave up removing block directory {} after {:?}: still in use",
                entry.value().path().display(),
                entry.value().remove_timeout()
            );
            return;
        }
        sleep(interval).await;
    }
}
