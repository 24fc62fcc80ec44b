use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub const DEFAULT_REMOVE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_ACTIVE_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Capability surface the cache needs from a cached value.
///
/// The cache never reads the directory contents; it only accounts for the
/// declared size and, once an evicted value is quiescent, unlinks its path.
pub trait BlockBacking: Clone + Send + Sync + 'static {
    /// Declared size in bytes, charged against the cache limits.
    fn size(&self) -> u64;

    /// Filesystem location of the backing directory.
    fn path(&self) -> &Path;

    /// Unlink the backing directory tree.
    ///
    /// # Errors
    /// Returns the underlying I/O error; a missing directory is not an error.
    fn remove_directory(&self) -> io::Result<()>;

    /// Readers outside the cache that still hold the directory open.
    fn active_queriers(&self) -> u32;

    /// How long the reaper keeps waiting for quiescence before giving up.
    fn remove_timeout(&self) -> Duration;

    /// Cadence at which the reaper re-checks for quiescence.
    fn active_check_interval(&self) -> Duration;
}

/// On-disk directory holding one pre-materialized index block.
#[derive(Debug, Clone)]
pub struct BlockDirectory {
    path: PathBuf,
    size: u64,
    remove_timeout: Duration,
    active_check_interval: Duration,
    active_queriers: Arc<AtomicU32>,
}

impl BlockDirectory {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            remove_timeout: DEFAULT_REMOVE_TIMEOUT,
            active_check_interval: DEFAULT_ACTIVE_CHECK_INTERVAL,
            active_queriers: Arc::new(AtomicU32::new(0)),
        }
    }

    #[must_use]
    pub fn with_remove_timeout(mut self, timeout: Duration) -> Self {
        self.remove_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_active_check_interval(mut self, interval: Duration) -> Self {
        self.active_check_interval = interval;
        self
    }

    /// Register an external reader. The backing directory is not unlinked
    /// while any guard is alive.
    #[must_use]
    pub fn querier(&self) -> QuerierGuard {
        self.active_queriers.fetch_add(1, Ordering::AcqRel);
        QuerierGuard { active: Arc::clone(&self.active_queriers) }
    }
}

impl BlockBacking for BlockDirectory {
    fn size(&self) -> u64 {
        self.size
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn remove_directory(&self) -> io::Result<()> {
        match std::fs::remove_dir_all(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn active_queriers(&self) -> u32 {
        self.active_queriers.load(Ordering::Acquire)
    }

    fn remove_timeout(&self) -> Duration {
        self.remove_timeout
    }

    fn active_check_interval(&self) -> Duration {
        self.active_check_interval
    }
}

/// RAII handle for an external reader of a block directory.
pub struct QuerierGuard {
    active: Arc<AtomicU32>,
}

impl Drop for QuerierGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}
