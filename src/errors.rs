use std::fmt;

use thiserror::Error;

/// Configuration validation failures, one variant per rejected field.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("blocks cache ttl must not be 0")]
    ZeroTtl,

    #[error("blocks cache soft_limit must not be 0")]
    ZeroSoftLimit,

    #[error("blocks cache soft_limit must not be greater than hard_limit")]
    SoftAboveHard,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("context canceled")]
    Cancelled,

    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    #[error("entry exceeds hard limit: {0}")]
    ExceedsHardLimit(String),

    #[error("unbalanced release of entry: {0}")]
    UnbalancedRelease(String),

    #[error(transparent)]
    Multi(#[from] MultiError),
}

/// Per-key failures from a bulk operation, kept in input order.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<CacheError>,
}

impl MultiError {
    pub fn push(&mut self, err: CacheError) {
        self.errors.push(err);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[CacheError] {
        &self.errors
    }

    /// Collapse into a single result: `Ok` when nothing failed.
    ///
    /// # Errors
    /// Returns `CacheError::Multi` carrying the accumulated failures.
    pub fn into_result(self) -> Result<(), CacheError> {
        if self.is_empty() { Ok(()) } else { Err(CacheError::Multi(self)) }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors: ", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}
