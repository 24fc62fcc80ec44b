use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SOFT_LIMIT: u64 = 16 << 30;
const DEFAULT_HARD_LIMIT: u64 = 32 << 30;

/// Configuration for the blocks cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlocksCacheConfig {
    /// When false the cache is a no-op and the other fields are ignored.
    pub enabled: bool,
    /// Maximum residence time of an entry.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Target upper bound on resident bytes; exceeding it triggers an LRU pass.
    pub soft_limit: u64,
    /// Absolute upper bound on resident bytes; admissions past it fail.
    pub hard_limit: u64,
    /// Cadence of the background TTL sweep.
    #[serde(with = "humantime_serde")]
    pub purge_interval: Duration,
}

impl Default for BlocksCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: DEFAULT_TTL,
            soft_limit: DEFAULT_SOFT_LIMIT,
            hard_limit: DEFAULT_HARD_LIMIT,
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }
}

impl BlocksCacheConfig {
    /// Check the configuration for use. A disabled cache always validates.
    ///
    /// # Errors
    /// Returns the `ConfigError` variant naming the rejected field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        if self.soft_limit == 0 {
            return Err(ConfigError::ZeroSoftLimit);
        }
        if self.soft_limit > self.hard_limit {
            return Err(ConfigError::SoftAboveHard);
        }
        Ok(())
    }

    /// Sweep cadence with a zero interval mapped to the default.
    pub(crate) fn effective_purge_interval(&self) -> Duration {
        if self.purge_interval.is_zero() { DEFAULT_PURGE_INTERVAL } else { self.purge_interval }
    }
}
