//! Storage backends.
//!
//! A backend is a byte-keyed store with atomic, check-and-set batch writes.
//! Every stored entry carries the commit epoch that wrote it; a write can
//! require the entry to be absent or still at a given epoch, and the whole
//! batch fails with [`StorageError::Conflict`] if any requirement does not
//! hold.
//!
//! - [`InMemoryBackend`] - Volatile, for tests and embedded use
//! - [`FileBackend`] - In-memory image backed by an append-only log
//! - [`RetryingBackend`] - Bounded retry of transient failures

mod file;
pub mod keys;
mod memory;
mod retry;

use bytes::Bytes;
use strata_common::types::EpochId;
use strata_common::utils::error::{Result, StorageError};

pub use file::{DurabilityMode, FileBackend};
pub use memory::InMemoryBackend;
pub use retry::{RetryPolicy, RetryingBackend};

/// A value and the epoch that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Commit epoch of the last write.
    pub version: EpochId,
    /// Stored bytes.
    pub value: Bytes,
}

/// Precondition on the current state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// No check.
    Any,
    /// The key must not exist.
    Absent,
    /// The key must exist at exactly this version.
    Version(EpochId),
}

impl Expected {
    /// `Version(v)` for `Some(v)`, `Absent` otherwise.
    #[must_use]
    pub fn from_version(version: Option<EpochId>) -> Self {
        version.map_or(Expected::Absent, Expected::Version)
    }

    /// Returns true if `current` satisfies this precondition.
    #[must_use]
    pub fn matches(&self, current: Option<&StoredEntry>) -> bool {
        match (self, current) {
            (Expected::Any, _) => true,
            (Expected::Absent, None) => true,
            (Expected::Version(v), Some(entry)) => entry.version == *v,
            _ => false,
        }
    }
}

/// One write in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Stores `value` under `key`.
    Put {
        /// Key.
        key: Vec<u8>,
        /// New value.
        value: Bytes,
        /// Precondition.
        expected: Expected,
    },
    /// Removes `key`.
    Delete {
        /// Key.
        key: Vec<u8>,
        /// Precondition.
        expected: Expected,
    },
}

impl WriteOp {
    /// The key this operation touches.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key, .. } => key,
        }
    }

    /// The operation's precondition.
    #[must_use]
    pub fn expected(&self) -> Expected {
        match self {
            WriteOp::Put { expected, .. } | WriteOp::Delete { expected, .. } => *expected,
        }
    }
}

/// Writes applied atomically, all stamped with `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    /// Commit epoch written into every put entry.
    pub version: EpochId,
    /// Operations, at most one per key.
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch for `version`.
    #[must_use]
    pub fn new(version: EpochId) -> Self {
        Self {
            version,
            ops: Vec::new(),
        }
    }

    /// Adds a put.
    pub fn put(&mut self, key: Vec<u8>, value: impl Into<Bytes>, expected: Expected) -> &mut Self {
        self.ops.push(WriteOp::Put {
            key,
            value: value.into(),
            expected,
        });
        self
    }

    /// Adds a delete.
    pub fn delete(&mut self, key: Vec<u8>, expected: Expected) -> &mut Self {
        self.ops.push(WriteOp::Delete { key, expected });
        self
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A byte-keyed store with atomic check-and-set batches.
///
/// Implementations report transient outages as
/// [`StorageError::Unavailable`] and must guarantee that an operation that
/// failed that way had no effect.
pub trait StorageBackend: Send + Sync {
    /// Identity of this backend instance. Distinct instances never share
    /// an id.
    fn id(&self) -> &str;

    /// Reads one key.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be read.
    fn read(&self, key: &[u8]) -> Result<Option<StoredEntry>>;

    /// Reads every key starting with `prefix`, in key order.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be read.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, StoredEntry)>>;

    /// Applies `batch` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] without applying anything if any
    /// precondition fails.
    fn write_batch(&self, batch: &WriteBatch) -> Result<()>;

    /// Closes the backend. Later calls fail with [`StorageError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an error if pending data cannot be flushed.
    fn close(&self) -> Result<()>;

    /// Returns false once closed.
    fn is_open(&self) -> bool;
}

/// Checks every precondition of `batch` against `lookup`.
pub(crate) fn check_batch<'a>(
    batch: &WriteBatch,
    lookup: impl Fn(&[u8]) -> Option<&'a StoredEntry>,
) -> Result<()> {
    for op in &batch.ops {
        if !op.expected().matches(lookup(op.key())) {
            return Err(StorageError::Conflict {
                key: keys::describe(op.key()),
            }
            .into());
        }
    }
    Ok(())
}

/// Returns `Err(Closed)` unless `open`.
pub(crate) fn ensure_open(open: bool) -> Result<()> {
    if open {
        Ok(())
    } else {
        Err(StorageError::Closed.into())
    }
}
