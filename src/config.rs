//! Store configuration.

use serde::{Deserialize, Serialize};

/// Default cache duration: seven minutes.
pub const DEFAULT_CACHE_DURATION_MS: u64 = 7 * 60 * 1000;

/// Session-wide settings for a [`Store`](crate::lifecycle::Store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a cached resource counts as fresh, unless its model overrides it.
    pub cache_duration_ms: u64,
    /// Share one in-flight related fetch between callers asking for the same URL.
    pub coalesce_fetches: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_duration_ms: DEFAULT_CACHE_DURATION_MS,
            coalesce_fetches: true,
        }
    }
}

impl StoreConfig {
    pub fn with_cache_duration(mut self, duration: std::time::Duration) -> Self {
        self.cache_duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce_fetches = coalesce;
        self
    }

    pub fn cache_duration(&self) -> chrono::Duration {
        let millis = i64::try_from(self.cache_duration_ms).unwrap_or(i64::MAX);
        chrono::Duration::milliseconds(millis)
    }
}
