//! A backend together with its permanent cache.

use std::sync::Arc;

use strata_common::utils::error::Result;

use crate::cache::{CacheConfig, CacheStats, PermanentCache};
use crate::storage::{StorageBackend, StoredEntry, WriteBatch};

/// An open backend connection.
///
/// Owns the [`PermanentCache`] for its backend: the cache is created here
/// and torn down in [`close`](Self::close), so two connections never share
/// cached state.
pub struct BackendConnection {
    backend: Arc<dyn StorageBackend>,
    cache: PermanentCache,
}

impl BackendConnection {
    /// Opens a connection and its cache.
    #[must_use]
    pub fn open(backend: Arc<dyn StorageBackend>, cache: CacheConfig) -> Self {
        let cache = PermanentCache::open(backend.as_ref(), cache);
        Self { backend, cache }
    }

    /// Backend identity.
    #[must_use]
    pub fn id(&self) -> &str {
        self.backend.id()
    }

    /// Reads a committed entry through the cache.
    ///
    /// # Errors
    ///
    /// Returns the backend's error on a miss that cannot be loaded.
    pub fn read(&self, key: &[u8]) -> Result<Option<StoredEntry>> {
        self.cache.read(self.backend.as_ref(), key)
    }

    /// Scans committed entries directly from the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, StoredEntry)>> {
        self.backend.scan_prefix(prefix)
    }

    /// Writes a batch through the cache.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, including version conflicts.
    pub fn write(&self, batch: &WriteBatch) -> Result<()> {
        self.cache.write_through(self.backend.as_ref(), batch)
    }

    /// The connection's cache.
    #[must_use]
    pub fn cache(&self) -> &PermanentCache {
        &self.cache
    }

    /// Cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Closes the cache, then the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's close error.
    pub fn close(&self) -> Result<()> {
        self.cache.close();
        self.backend.close()
    }

    /// Returns false once closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.cache.is_open() && self.backend.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Expected, InMemoryBackend};
    use strata_common::types::EpochId;

    #[test]
    fn test_caches_are_per_connection() {
        let a = BackendConnection::open(Arc::new(InMemoryBackend::new()), CacheConfig::default());
        let b = BackendConnection::open(Arc::new(InMemoryBackend::new()), CacheConfig::default());

        let mut batch = WriteBatch::new(EpochId::new(1));
        batch.put(b"Ea".to_vec(), &b"1"[..], Expected::Absent);
        a.write(&batch).unwrap();

        assert!(a.cache().contains(b"Ea"));
        assert!(!b.cache().contains(b"Ea"));
        assert!(b.read(b"Ea").unwrap().is_none());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_close_tears_down_cache() {
        let conn = BackendConnection::open(Arc::new(InMemoryBackend::new()), CacheConfig::default());
        let mut batch = WriteBatch::new(EpochId::new(1));
        batch.put(b"Ea".to_vec(), &b"1"[..], Expected::Absent);
        conn.write(&batch).unwrap();
        conn.close().unwrap();
        assert!(!conn.is_open());
        assert!(conn.cache().is_empty());
        assert!(conn.read(b"Ea").is_err());
    }
}
