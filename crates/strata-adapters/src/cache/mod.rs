//! Permanent cache of committed element snapshots.
//!
//! One cache belongs to one backend connection. It is created when the
//! connection opens, emptied when it closes, and refuses to serve any
//! other backend.
//!
//! Reads go through [`PermanentCache::read`]: a hit returns the cached
//! entry, a miss loads from the backend and populates the cache. Commits
//! go through [`PermanentCache::write_through`], which holds the cache's
//! write lock across the backend batch and the entry updates, so no
//! reader can see the backend and the cache disagree.
//!
//! A miss that raced with a commit must not re-insert the snapshot it read
//! before that commit. Every commit bumps a generation counter both before
//! and after its backend write; a miss only populates the cache if the
//! generation is unchanged since it started, and never replaces an entry
//! with a newer version.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::RwLock;
use strata_common::utils::error::{Error, Result, StorageError};

use crate::storage::{StorageBackend, StoredEntry, WriteBatch, WriteOp, keys};

/// Cache settings for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// When false every call goes straight to the backend.
    pub enabled: bool,
    /// Maximum number of cached entries. Oldest entries are evicted first.
    pub capacity: usize,
    /// Entries older than this are treated as misses.
    pub time_to_live: Option<Duration>,
}

impl CacheConfig {
    /// A cache that never stores anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            time_to_live: None,
        }
    }
}

/// Counters since the cache was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from the cache.
    pub hits: u64,
    /// Reads that went to the backend.
    pub misses: u64,
    /// Entries dropped for capacity.
    pub evictions: u64,
    /// Entries dropped because a commit deleted them or a write failed.
    pub invalidations: u64,
    /// Entries currently cached.
    pub entries: usize,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    entry: StoredEntry,
    inserted: Instant,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// Read-through, write-through cache scoped to one backend.
pub struct PermanentCache {
    backend_id: String,
    config: CacheConfig,
    entries: RwLock<IndexMap<Vec<u8>, CacheEntry>>,
    generation: AtomicU64,
    counters: Counters,
    open: AtomicBool,
}

impl PermanentCache {
    /// Opens an empty cache bound to `backend`.
    #[must_use]
    pub fn open(backend: &dyn StorageBackend, config: CacheConfig) -> Self {
        tracing::debug!(
            "opening permanent cache for {} (enabled: {}, capacity: {})",
            backend.id(),
            config.enabled,
            config.capacity
        );
        Self {
            backend_id: backend.id().to_string(),
            config,
            entries: RwLock::new(IndexMap::new()),
            generation: AtomicU64::new(0),
            counters: Counters::default(),
            open: AtomicBool::new(true),
        }
    }

    /// Identity of the backend this cache serves.
    #[must_use]
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    /// The settings the cache was opened with.
    #[must_use]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    fn active(&self) -> bool {
        self.config.enabled && self.config.capacity > 0
    }

    fn check_scope(&self, backend: &dyn StorageBackend) -> Result<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(StorageError::Closed.into());
        }
        if backend.id() != self.backend_id {
            return Err(Error::Internal(format!(
                "cache for {} used with backend {}",
                self.backend_id,
                backend.id()
            )));
        }
        Ok(())
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        self.config
            .time_to_live
            .is_none_or(|ttl| now.duration_since(entry.inserted) < ttl)
    }

    /// Returns the committed entry for `key`, from the cache if possible.
    ///
    /// # Errors
    ///
    /// Returns the backend's error on a miss that cannot be loaded.
    pub fn read(&self, backend: &dyn StorageBackend, key: &[u8]) -> Result<Option<StoredEntry>> {
        self.check_scope(backend)?;
        if !self.active() {
            return backend.read(key);
        }

        {
            let entries = self.entries.read();
            if let Some(cached) = entries.get(key) {
                if self.is_fresh(cached, Instant::now()) {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(cached.entry.clone()));
                }
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let generation = self.generation.load(Ordering::Acquire);
        let loaded = backend.read(key)?;
        if let Some(entry) = &loaded {
            let mut entries = self.entries.write();
            let newer_cached = entries
                .get(key)
                .is_some_and(|cached| cached.entry.version > entry.version);
            if self.generation.load(Ordering::Acquire) == generation && !newer_cached {
                entries.shift_remove(key);
                self.insert(&mut entries, key.to_vec(), entry.clone());
            }
        }
        Ok(loaded)
    }

    /// Applies `batch` to the backend and the cache as one step.
    ///
    /// On success puts refresh their entries and deletes drop theirs. On a
    /// version conflict nothing changed, so the cache is left alone; on any
    /// other failure the touched entries are dropped, since the backend
    /// state is unknown.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    pub fn write_through(&self, backend: &dyn StorageBackend, batch: &WriteBatch) -> Result<()> {
        self.check_scope(backend)?;
        if !self.active() {
            return backend.write_batch(batch);
        }

        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let written = backend.write_batch(batch);
        // A miss that sampled the generation during the write read an
        // unknown side of it.
        self.generation.fetch_add(1, Ordering::AcqRel);
        match written {
            Ok(()) => {
                for op in &batch.ops {
                    match op {
                        WriteOp::Put { key, value, .. } => {
                            let entry = StoredEntry {
                                version: batch.version,
                                value: value.clone(),
                            };
                            entries.shift_remove(key.as_slice());
                            self.insert(&mut entries, key.clone(), entry);
                        }
                        WriteOp::Delete { key, .. } => {
                            if entries.shift_remove(key.as_slice()).is_some() {
                                self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }
                Ok(())
            }
            Err(e) => {
                if !matches!(e, Error::Storage(StorageError::Conflict { .. })) {
                    let dropped = batch
                        .ops
                        .iter()
                        .filter(|op| entries.shift_remove(op.key()).is_some())
                        .count();
                    self.counters
                        .invalidations
                        .fetch_add(dropped as u64, Ordering::Relaxed);
                    tracing::warn!(
                        "write to {} failed, invalidated {} cache entries: {}",
                        self.backend_id,
                        dropped,
                        e
                    );
                }
                Err(e)
            }
        }
    }

    /// Stores `entry` for `key`, replacing any cached entry.
    pub fn update(&self, key: &[u8], entry: StoredEntry) {
        if !self.active() {
            return;
        }
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.shift_remove(key);
        self.insert(&mut entries, key.to_vec(), entry);
    }

    /// Drops the cached entry for `key`. Returns true if one was cached.
    pub fn invalidate(&self, key: &[u8]) -> bool {
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        let removed = entries.shift_remove(key).is_some();
        if removed {
            self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    fn insert(&self, entries: &mut IndexMap<Vec<u8>, CacheEntry>, key: Vec<u8>, entry: StoredEntry) {
        entries.insert(
            key,
            CacheEntry {
                entry,
                inserted: Instant::now(),
            },
        );
        while entries.len() > self.config.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("evicted {} from permanent cache", keys::describe(&evicted));
            }
        }
    }

    /// Returns true if `key` has a fresh cached entry.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries
            .read()
            .get(key)
            .is_some_and(|e| self.is_fresh(e, Instant::now()))
    }

    /// Number of cached entries, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
    }

    /// Empties the cache and refuses further use.
    pub fn close(&self) {
        self.clear();
        self.open.store(false, Ordering::Release);
        tracing::debug!("closed permanent cache for {}", self.backend_id);
    }

    /// Returns false once closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}
