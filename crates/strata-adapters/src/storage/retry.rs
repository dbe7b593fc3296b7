//! Bounded retry of transient backend failures.

use std::time::Duration;

use strata_common::utils::error::Result;

use super::{StorageBackend, StoredEntry, WriteBatch};

/// How often and how patiently to retry an unavailable backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for the doubling wait.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Wait before retry number `retry` (0-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
        }
    }
}

/// Wraps a backend and retries operations that fail with
/// [`StorageError::Unavailable`](strata_common::utils::error::StorageError::Unavailable).
///
/// Conflicts, corruption and every other error are returned at once.
pub struct RetryingBackend<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: StorageBackend> RetryingBackend<B> {
    /// Wraps `inner`.
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// The retry policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    fn with_retry<T>(&self, op: &str, mut f: impl FnMut(&B) -> Result<T>) -> Result<T> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match f(&self.inner) {
                Err(e) if e.is_backend_unavailable() && attempt < attempts => {
                    let wait = self.policy.backoff(attempt - 1);
                    tracing::warn!(
                        "{} on {} failed (attempt {}/{}): {}; retrying in {:?}",
                        op,
                        self.inner.id(),
                        attempt,
                        attempts,
                        e,
                        wait
                    );
                    std::thread::sleep(wait);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_backend_unavailable() {
                        tracing::error!(
                            "{} on {} failed after {} attempts: {}",
                            op,
                            self.inner.id(),
                            attempt,
                            e
                        );
                    }
                    return Err(e);
                }
                ok => return ok,
            }
        }
    }
}

impl<B: StorageBackend> StorageBackend for RetryingBackend<B> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn read(&self, key: &[u8]) -> Result<Option<StoredEntry>> {
        self.with_retry("read", |b| b.read(key))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, StoredEntry)>> {
        self.with_retry("scan", |b| b.scan_prefix(prefix))
    }

    fn write_batch(&self, batch: &WriteBatch) -> Result<()> {
        self.with_retry("write", |b| b.write_batch(batch))
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBackend;
    use std::sync::atomic::{AtomicU32, Ordering};
    use strata_common::types::EpochId;
    use strata_common::utils::error::StorageError;

    /// Fails the first `failures` calls with `Unavailable`.
    struct Flaky {
        inner: InMemoryBackend,
        failures: AtomicU32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                inner: InMemoryBackend::new(),
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }

        fn trip(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StorageError::Unavailable("timeout".into()).into());
            }
            Ok(())
        }
    }

    impl StorageBackend for Flaky {
        fn id(&self) -> &str {
            self.inner.id()
        }
        fn read(&self, key: &[u8]) -> Result<Option<StoredEntry>> {
            self.trip()?;
            self.inner.read(key)
        }
        fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, StoredEntry)>> {
            self.trip()?;
            self.inner.scan_prefix(prefix)
        }
        fn write_batch(&self, batch: &WriteBatch) -> Result<()> {
            self.trip()?;
            self.inner.write_batch(batch)
        }
        fn close(&self) -> Result<()> {
            self.inner.close()
        }
        fn is_open(&self) -> bool {
            self.inner.is_open()
        }
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_recovers_within_budget() {
        let backend = RetryingBackend::new(Flaky::new(2), fast(3));
        assert!(backend.read(b"k").unwrap().is_none());
        assert_eq!(backend.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_surfaces_after_budget() {
        let backend = RetryingBackend::new(Flaky::new(5), fast(3));
        let err = backend.read(b"k").unwrap_err();
        assert!(err.is_backend_unavailable());
        assert_eq!(backend.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_conflicts_are_not_retried() {
        let backend = RetryingBackend::new(Flaky::new(0), fast(5));
        let mut batch = WriteBatch::new(EpochId::new(1));
        batch.put(b"k".to_vec(), &b"v"[..], crate::storage::Expected::Version(EpochId::new(7)));
        let err = backend.write_batch(&batch).unwrap_err();
        assert!(!err.is_backend_unavailable());
        assert_eq!(backend.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(10));
        assert_eq!(policy.backoff(1), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(50));
        assert_eq!(policy.backoff(40), Duration::from_millis(50));
    }
}
