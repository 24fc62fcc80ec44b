use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

/// Lifecycle of a cached entry.
///
/// `Resident` entries are findable; `Evicted` entries have been unlinked from
/// the index but their backing directory still exists; `Reaped` and
/// `Abandoned` are terminal reaper outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Resident,
    Evicted,
    Reaped,
    Abandoned,
}

impl EntryState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Resident,
            1 => Self::Evicted,
            2 => Self::Reaped,
            _ => Self::Abandoned,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Resident => 0,
            Self::Evicted => 1,
            Self::Reaped => 2,
            Self::Abandoned => 3,
        }
    }
}

/// Record for one cached block directory.
///
/// Shared as `Arc<Entry<V>>` between the index and the reaper; the refcount
/// is an atomic so the reaper can poll it without taking the index lock.
pub struct Entry<V> {
    key: String,
    value: V,
    ref_count: AtomicI32,
    state: AtomicU8,
    created_at: Instant,
    last_access: Mutex<Instant>,
}

impl<V> Entry<V> {
    pub(crate) fn new(key: &str, value: V, initial_refs: i32) -> Self {
        let now = Instant::now();
        Self {
            key: key.to_string(),
            value,
            ref_count: AtomicI32::new(initial_refs),
            state: AtomicU8::new(EntryState::Resident.as_u8()),
            created_at: now,
            last_access: Mutex::new(now),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[must_use]
    pub fn ref_count(&self) -> i32 {
        self.ref_count.load(Ordering::Acquire)
    }

    pub(crate) fn acquire(&self) {
        self.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one reference. The count never goes below zero; a release with no
    /// matching acquire is reported as `Err`.
    pub(crate) fn release(&self) -> Result<i32, ()> {
        self.ref_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                if count > 0 { Some(count - 1) } else { None }
            })
            .map(|previous| previous - 1)
            .map_err(|_| ())
    }

    #[must_use]
    pub fn state(&self) -> EntryState {
        EntryState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: EntryState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub fn last_access(&self) -> Instant {
        *self.last_access.lock()
    }

    pub(crate) fn touch(&self, now: Instant) {
        *self.last_access.lock() = now;
    }
}
