//! Append-only batch log.
//!
//! Each record is `[len: u32 LE][bincode data][crc32: u32 LE]`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strata_common::types::EpochId;
use strata_common::utils::error::{Error, Result};

use crate::storage::{WriteBatch, WriteOp};

/// When log writes reach the disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DurabilityMode {
    /// fsync after every batch.
    #[default]
    Sync,
    /// Flush to the OS only.
    NoSync,
}

/// One logged operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOp {
    /// Key set to value.
    Put {
        /// Key.
        key: Vec<u8>,
        /// Value.
        value: Vec<u8>,
    },
    /// Key removed.
    Delete {
        /// Key.
        key: Vec<u8>,
    },
}

/// One applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Commit epoch of the batch.
    pub version: EpochId,
    /// Operations in batch order.
    pub ops: Vec<LogOp>,
}

impl LogRecord {
    /// The logged form of a batch whose preconditions already held.
    #[must_use]
    pub fn from_batch(batch: &WriteBatch) -> Self {
        let ops = batch
            .ops
            .iter()
            .map(|op| match op {
                WriteOp::Put { key, value, .. } => LogOp::Put {
                    key: key.clone(),
                    value: value.to_vec(),
                },
                WriteOp::Delete { key, .. } => LogOp::Delete { key: key.clone() },
            })
            .collect();
        Self {
            version: batch.version,
            ops,
        }
    }
}

/// File operations the log writer needs beyond [`Write`].
pub trait LogFile: Write + Send {
    /// Current length in bytes.
    ///
    /// # Errors
    ///
    /// Returns the OS error.
    fn size(&self) -> io::Result<u64>;

    /// Cuts the file back to `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns the OS error.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Forces written data to disk.
    ///
    /// # Errors
    ///
    /// Returns the OS error.
    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

struct Tail<F> {
    file: F,
    /// Length of the acknowledged prefix.
    len: u64,
}

/// Appends records to the log file.
///
/// A record is acknowledged only once it is fully written (and synced in
/// [`DurabilityMode::Sync`]). When an append fails, the file is cut back
/// to the acknowledged prefix so replay never resurrects a batch whose
/// write was reported as failed. If even that fails the writer closes.
pub struct LogWriter<F: LogFile = File> {
    tail: Mutex<Option<Tail<F>>>,
    durability: DurabilityMode,
}

impl LogWriter<File> {
    /// Opens the log for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, durability: DurabilityMode) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Self::with_file(file, durability)
    }
}

impl<F: LogFile> LogWriter<F> {
    /// Appends to an already opened file positioned at its end.
    ///
    /// # Errors
    ///
    /// Returns an error if the file length cannot be read.
    pub fn with_file(file: F, durability: DurabilityMode) -> Result<Self> {
        let len = file.size()?;
        Ok(Self {
            tail: Mutex::new(Some(Tail { file, len })),
            durability,
        })
    }

    /// Appends one record and makes it durable per the configured mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written; the log is then
    /// left as it was before the call.
    pub fn append(&self, record: &LogRecord) -> Result<()> {
        let mut guard = self.tail.lock();
        let tail = guard
            .as_mut()
            .ok_or_else(|| Error::Internal("log writer is closed".to_string()))?;

        let data = bincode::serde::encode_to_vec(record, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let mut frame = Vec::with_capacity(data.len() + 8);
        frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
        frame.extend_from_slice(&data);
        frame.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());

        match write_frame(&mut tail.file, &frame, self.durability) {
            Ok(()) => {
                tail.len += frame.len() as u64;
                Ok(())
            }
            Err(e) => {
                let acknowledged = tail.len;
                let undone = tail.file.truncate(acknowledged).and_then(|()| {
                    if self.durability == DurabilityMode::Sync {
                        tail.file.sync()
                    } else {
                        Ok(())
                    }
                });
                match undone {
                    Ok(()) => tracing::warn!(
                        "log append of epoch {:?} failed, cut back to {} bytes: {}",
                        record.version,
                        acknowledged,
                        e
                    ),
                    Err(undo) => {
                        tracing::error!(
                            "log append of epoch {:?} failed and could not be undone, closing log: {}",
                            record.version,
                            undo
                        );
                        *guard = None;
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Flushes and closes the file. Later appends fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(&self) -> Result<()> {
        if let Some(mut tail) = self.tail.lock().take() {
            tail.file.flush()?;
            tail.file.sync()?;
        }
        Ok(())
    }
}

fn write_frame(file: &mut impl LogFile, frame: &[u8], durability: DurabilityMode) -> io::Result<()> {
    file.write_all(frame)?;
    file.flush()?;
    if durability == DurabilityMode::Sync {
        file.sync()?;
    }
    Ok(())
}
