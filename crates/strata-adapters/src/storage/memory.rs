//! Volatile backend.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use strata_common::utils::error::Result;

use super::{StorageBackend, StoredEntry, WriteBatch, WriteOp, check_batch, ensure_open};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Keys in a `BTreeMap` behind a lock.
pub struct InMemoryBackend {
    id: String,
    data: RwLock<BTreeMap<Vec<u8>, StoredEntry>>,
    open: AtomicBool,
}

impl InMemoryBackend {
    /// Creates an empty backend with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("memory-{instance}"),
            data: RwLock::new(BTreeMap::new()),
            open: AtomicBool::new(true),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects the entries of `data` whose key starts with `prefix`.
pub(crate) fn scan(
    data: &BTreeMap<Vec<u8>, StoredEntry>,
    prefix: &[u8],
) -> Vec<(Vec<u8>, StoredEntry)> {
    data.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Applies an already checked batch.
pub(crate) fn apply(data: &mut BTreeMap<Vec<u8>, StoredEntry>, batch: &WriteBatch) {
    for op in &batch.ops {
        match op {
            WriteOp::Put { key, value, .. } => {
                data.insert(
                    key.clone(),
                    StoredEntry {
                        version: batch.version,
                        value: value.clone(),
                    },
                );
            }
            WriteOp::Delete { key, .. } => {
                data.remove(key);
            }
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&self, key: &[u8]) -> Result<Option<StoredEntry>> {
        ensure_open(self.is_open())?;
        Ok(self.data.read().get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, StoredEntry)>> {
        ensure_open(self.is_open())?;
        Ok(scan(&self.data.read(), prefix))
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<()> {
        ensure_open(self.is_open())?;
        let mut data = self.data.write();
        check_batch(batch, |k| data.get(k))?;
        apply(&mut data, batch);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Expected;
    use strata_common::types::EpochId;

    #[test]
    fn test_check_and_set() {
        let backend = InMemoryBackend::new();
        let mut batch = WriteBatch::new(EpochId::new(1));
        batch.put(b"Ea".to_vec(), &b"1"[..], Expected::Absent);
        backend.write_batch(&batch).unwrap();
        assert_eq!(backend.read(b"Ea").unwrap().unwrap().version, EpochId::new(1));

        // Second insert of the same key conflicts
        let err = backend.write_batch(&batch).unwrap_err();
        assert!(err.to_string().contains("version conflict"));

        let mut update = WriteBatch::new(EpochId::new(2));
        update.put(b"Ea".to_vec(), &b"2"[..], Expected::Version(EpochId::new(1)));
        backend.write_batch(&update).unwrap();
        assert_eq!(&backend.read(b"Ea").unwrap().unwrap().value[..], b"2");
    }

    #[test]
    fn test_failed_batch_applies_nothing() {
        let backend = InMemoryBackend::new();
        let mut batch = WriteBatch::new(EpochId::new(1));
        batch
            .put(b"Ea".to_vec(), &b"1"[..], Expected::Absent)
            .put(b"Eb".to_vec(), &b"1"[..], Expected::Version(EpochId::new(9)));
        assert!(backend.write_batch(&batch).is_err());
        assert!(backend.is_empty());
    }

    #[test]
    fn test_scan_prefix_and_delete() {
        let backend = InMemoryBackend::new();
        let mut batch = WriteBatch::new(EpochId::new(1));
        batch
            .put(b"Ea".to_vec(), &b"1"[..], Expected::Any)
            .put(b"Eb".to_vec(), &b"2"[..], Expected::Any)
            .put(b"Sx".to_vec(), &b"3"[..], Expected::Any);
        backend.write_batch(&batch).unwrap();
        let scanned = backend.scan_prefix(b"E").unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].0, b"Ea".to_vec());

        let mut del = WriteBatch::new(EpochId::new(2));
        del.delete(b"Ea".to_vec(), Expected::Version(EpochId::new(1)));
        backend.write_batch(&del).unwrap();
        assert!(backend.read(b"Ea").unwrap().is_none());
    }

    #[test]
    fn test_distinct_identities_and_close() {
        let a = InMemoryBackend::new();
        let b = InMemoryBackend::new();
        assert_ne!(a.id(), b.id());
        a.close().unwrap();
        assert!(!a.is_open());
        assert!(a.read(b"x").is_err());
    }
}
