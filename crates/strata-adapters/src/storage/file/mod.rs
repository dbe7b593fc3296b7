//! Durable backend: an in-memory image rebuilt from an append-only log.
//!
//! Every applied batch becomes one checksummed log record. On open the log
//! is replayed; a torn or corrupt tail (from a crash mid-append) is
//! discarded and the file cut back to its last intact record.

mod log;
mod recovery;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use strata_common::utils::error::Result;

pub use log::DurabilityMode;
use log::{LogOp, LogRecord, LogWriter};
use recovery::LogRecovery;

use super::memory::{apply, scan};
use super::{StorageBackend, StoredEntry, WriteBatch, check_batch, ensure_open};

/// Name of the log file inside the database directory.
const LOG_FILE: &str = "strata.log";

/// A backend persisted to `<dir>/strata.log`.
pub struct FileBackend {
    id: String,
    dir: PathBuf,
    data: RwLock<BTreeMap<Vec<u8>, StoredEntry>>,
    log: LogWriter,
    open: AtomicBool,
}

impl FileBackend {
    /// Opens or creates the backend in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or log cannot be opened.
    pub fn open(dir: impl AsRef<Path>, durability: DurabilityMode) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(LOG_FILE);

        let recovery = LogRecovery::new(&path);
        let recovered = recovery.recover()?;
        if recovered.truncated {
            tracing::warn!(
                "discarding damaged log tail after {} bytes in {}",
                recovered.valid_len,
                path.display()
            );
            recovery.truncate(recovered.valid_len)?;
        }

        let mut data = BTreeMap::new();
        let record_count = recovered.records.len();
        for record in recovered.records {
            replay(&mut data, record);
        }
        tracing::debug!(
            "replayed {} log records ({} keys) from {}",
            record_count,
            data.len(),
            path.display()
        );

        let log = LogWriter::open(&path, durability)?;
        Ok(Self {
            id: format!("file:{}", dir.display()),
            dir,
            data: RwLock::new(data),
            log,
            open: AtomicBool::new(true),
        })
    }

    /// Directory holding the log.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn replay(data: &mut BTreeMap<Vec<u8>, StoredEntry>, record: LogRecord) {
    for op in record.ops {
        match op {
            LogOp::Put { key, value } => {
                data.insert(
                    key,
                    StoredEntry {
                        version: record.version,
                        value: value.into(),
                    },
                );
            }
            LogOp::Delete { key } => {
                data.remove(&key);
            }
        }
    }
}

impl StorageBackend for FileBackend {
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
        // Log first; the image only changes once the record is written
        self.log.append(&LogRecord::from_batch(batch))?;
        apply(&mut data, batch);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.open.swap(false, Ordering::AcqRel) {
            self.log.close()?;
        }
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
    use std::io::Write;
    use strata_common::types::EpochId;
    use tempfile::tempdir;

    fn put(version: u64, key: &[u8], value: &'static [u8]) -> WriteBatch {
        let mut batch = WriteBatch::new(EpochId::new(version));
        batch.put(key.to_vec(), value, Expected::Any);
        batch
    }

    #[test]
    fn test_reopen_replays_log() {
        let dir = tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path(), DurabilityMode::Sync).unwrap();
            backend.write_batch(&put(1, b"Ea", b"one")).unwrap();
            backend.write_batch(&put(2, b"Eb", b"two")).unwrap();
            let mut del = WriteBatch::new(EpochId::new(3));
            del.delete(b"Ea".to_vec(), Expected::Version(EpochId::new(1)));
            backend.write_batch(&del).unwrap();
            backend.close().unwrap();
        }

        let backend = FileBackend::open(dir.path(), DurabilityMode::NoSync).unwrap();
        assert!(backend.read(b"Ea").unwrap().is_none());
        let b = backend.read(b"Eb").unwrap().unwrap();
        assert_eq!(b.version, EpochId::new(2));
        assert_eq!(&b.value[..], b"two");
    }

    #[test]
    fn test_conflict_is_not_logged() {
        let dir = tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path(), DurabilityMode::NoSync).unwrap();
            backend.write_batch(&put(1, b"Ea", b"one")).unwrap();
            let mut bad = WriteBatch::new(EpochId::new(2));
            bad.put(b"Ea".to_vec(), &b"two"[..], Expected::Absent);
            assert!(backend.write_batch(&bad).is_err());
            backend.close().unwrap();
        }
        let backend = FileBackend::open(dir.path(), DurabilityMode::NoSync).unwrap();
        assert_eq!(&backend.read(b"Ea").unwrap().unwrap().value[..], b"one");
    }

    #[test]
    fn test_torn_tail_is_discarded() {
        let dir = tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path(), DurabilityMode::Sync).unwrap();
            backend.write_batch(&put(1, b"Ea", b"one")).unwrap();
            backend.close().unwrap();
        }
        let path = dir.path().join(LOG_FILE);
        let intact = std::fs::metadata(&path).unwrap().len();
        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[200, 0, 0, 0, 1, 2]).unwrap();
        }

        let backend = FileBackend::open(dir.path(), DurabilityMode::Sync).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), intact);
        assert!(backend.read(b"Ea").unwrap().is_some());

        // Appends after recovery stay readable
        backend.write_batch(&put(2, b"Eb", b"two")).unwrap();
        backend.close().unwrap();
        let backend = FileBackend::open(dir.path(), DurabilityMode::Sync).unwrap();
        assert!(backend.read(b"Eb").unwrap().is_some());
    }

    #[test]
    fn test_closed_backend_rejects_io() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path(), DurabilityMode::NoSync).unwrap();
        backend.close().unwrap();
        assert!(backend.write_batch(&put(1, b"Ea", b"x")).is_err());
        assert!(backend.scan_prefix(b"E").is_err());
    }
}
