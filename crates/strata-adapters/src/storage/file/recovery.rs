//! Log replay.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use strata_common::utils::error::{Error, Result, StorageError};

use super::log::LogRecord;

/// Upper bound on one record; anything larger is a damaged header.
const MAX_RECORD_LEN: usize = 1 << 30;

/// Reads every intact record of a log file.
pub struct LogRecovery {
    path: PathBuf,
}

/// Result of reading a log.
#[derive(Debug, Default)]
pub struct Recovered {
    /// Intact records in log order.
    pub records: Vec<LogRecord>,
    /// Byte length of the intact prefix.
    pub valid_len: u64,
    /// True if a torn or corrupt tail was found after the intact prefix.
    pub truncated: bool,
}

impl LogRecovery {
    /// Creates a reader for the log at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Reads records until end of file or the first damaged record.
    ///
    /// A missing file recovers as empty.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be opened.
    pub fn recover(&self) -> Result<Recovered> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Recovered::default()),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        let mut recovered = Recovered::default();

        loop {
            match Self::read_record(&mut reader) {
                Ok(Some((record, len))) => {
                    recovered.records.push(record);
                    recovered.valid_len += len;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("log corruption detected in {}: {}", self.path.display(), e);
                    recovered.truncated = true;
                    break;
                }
            }
        }
        Ok(recovered)
    }

    /// Cuts the file back to `len` bytes, dropping a damaged tail.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be truncated.
    pub fn truncate(&self, len: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(len)?;
        file.sync_all()?;
        Ok(())
    }

    fn read_record(reader: &mut BufReader<File>) -> Result<Option<(LogRecord, u64)>> {
        let mut len_buf = [0u8; 4];
        match read_full(reader, &mut len_buf)? {
            0 => return Ok(None),
            4 => {}
            _ => return Err(StorageError::Corruption("torn record header".to_string()).into()),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_RECORD_LEN {
            return Err(StorageError::Corruption(format!("record length {len} out of range")).into());
        }

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;

        let mut checksum_buf = [0u8; 4];
        reader.read_exact(&mut checksum_buf)?;
        if u32::from_le_bytes(checksum_buf) != crc32fast::hash(&data) {
            return Err(StorageError::Corruption("log checksum mismatch".to_string()).into());
        }

        let (record, _): (LogRecord, _) =
            bincode::serde::decode_from_slice(&data, bincode::config::standard())
                .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Some((record, (len + 8) as u64)))
    }
}

/// Reads until `buf` is full or the file ends; returns the bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
