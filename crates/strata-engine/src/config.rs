//! Database configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use strata_adapters::{CacheConfig, DurabilityMode, RetryPolicy};

/// Database configuration.
///
/// Built in code; nothing is read from files or the environment.
///
/// # Examples
///
/// ```
/// use strata_engine::Config;
///
/// let config = Config::in_memory().with_cache_capacity(1_000);
/// assert!(config.path.is_none());
/// assert_eq!(config.cache.capacity, 1_000);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of the file backend. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Whether the file backend syncs every commit.
    pub durability: DurabilityMode,
    /// Permanent cache settings.
    pub cache: CacheConfig,
    /// Retry policy for an unavailable backend.
    pub retry: RetryPolicy,
}

impl Config {
    /// In-memory database with default cache and retry settings.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            durability: DurabilityMode::default(),
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Database persisted under `path`.
    #[must_use]
    pub fn persistent(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::in_memory()
        }
    }

    /// Replaces the cache settings.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Disables the permanent cache.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    /// Sets the maximum number of cached entries.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache.capacity = capacity;
        self
    }

    /// Expires cached entries after `ttl`.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.time_to_live = Some(ttl);
        self
    }

    /// Replaces the backend retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the file backend durability mode.
    #[must_use]
    pub fn with_durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let config = Config::persistent("/tmp/strata")
            .without_cache()
            .with_cache_ttl(Duration::from_secs(5))
            .with_retry(RetryPolicy::none())
            .with_durability(DurabilityMode::NoSync);

        assert_eq!(config.path.as_deref(), Some(Path::new("/tmp/strata")));
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.time_to_live, Some(Duration::from_secs(5)));
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.durability, DurabilityMode::NoSync);
    }

    #[test]
    fn test_with_cache_replaces_all_settings() {
        let config = Config::in_memory().with_cache(CacheConfig::disabled());
        assert_eq!(config.cache, CacheConfig::disabled());
    }
}
