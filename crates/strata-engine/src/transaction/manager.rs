//! Transaction, element id and epoch allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use strata_common::types::{ElementId, EpochId, TxId};

/// Hands out transaction ids, element ids and commit epochs, and orders
/// data commits against reads.
///
/// Data commits take the commit lock exclusively while they allocate their
/// epoch, write the backend and move index entries; queries hold it shared,
/// so a query never sees the backend ahead of the indexes. Element versions
/// therefore grow in commit order, and a transaction that remembers the
/// last published commit at open can tell every later write apart.
#[derive(Debug)]
pub struct TransactionManager {
    next_tx_id: AtomicU64,
    next_element_id: AtomicU64,
    epoch: AtomicU64,
    last_commit: AtomicU64,
    last_removal: AtomicU64,
    commit_lock: RwLock<()>,
}

impl TransactionManager {
    /// Creates a manager for an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::recovered(None, EpochId::INITIAL)
    }

    /// Creates a manager that continues after the highest stored element id
    /// and epoch.
    #[must_use]
    pub fn recovered(max_element: Option<ElementId>, epoch: EpochId) -> Self {
        let next_element = max_element.map_or(0, |id| id.as_u64() + 1);
        Self {
            next_tx_id: AtomicU64::new(1),
            next_element_id: AtomicU64::new(next_element),
            epoch: AtomicU64::new(epoch.as_u64()),
            last_commit: AtomicU64::new(epoch.as_u64()),
            last_removal: AtomicU64::new(EpochId::INITIAL.as_u64()),
            commit_lock: RwLock::new(()),
        }
    }

    /// Allocates a transaction id.
    pub fn begin(&self) -> TxId {
        TxId::new(self.next_tx_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocates a permanent element id.
    pub fn allocate_element_id(&self) -> ElementId {
        ElementId::new(self.next_element_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocates the epoch of a new commit.
    pub fn next_epoch(&self) -> EpochId {
        EpochId::new(self.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Last allocated epoch.
    #[must_use]
    pub fn current_epoch(&self) -> EpochId {
        EpochId::new(self.epoch.load(Ordering::SeqCst))
    }

    /// Epoch of the last data commit whose writes are complete. Every
    /// stored element version is at most this, or belongs to a commit still
    /// in flight.
    #[must_use]
    pub fn committed_epoch(&self) -> EpochId {
        EpochId::new(self.last_commit.load(Ordering::Acquire))
    }

    /// Returns true if a data commit completed after `epoch`.
    #[must_use]
    pub fn committed_after(&self, epoch: EpochId) -> bool {
        self.committed_epoch() > epoch
    }

    /// Returns true if a commit that removes elements started after `epoch`.
    #[must_use]
    pub fn removed_after(&self, epoch: EpochId) -> bool {
        self.last_removal.load(Ordering::Acquire) > epoch.as_u64()
    }

    /// Announces the removals of commit `epoch`. Called under the commit
    /// guard before the write, so a reader that misses a removed element
    /// already sees the mark.
    pub(crate) fn mark_removals(&self, epoch: EpochId) {
        self.last_removal.fetch_max(epoch.as_u64(), Ordering::AcqRel);
    }

    /// Publishes commit `epoch` once its writes are complete. Called under
    /// the commit guard.
    pub(crate) fn publish(&self, epoch: EpochId) {
        self.last_commit.fetch_max(epoch.as_u64(), Ordering::AcqRel);
    }

    /// Held by a data commit, or a schema commit that backfills indexes.
    pub(crate) fn commit_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.commit_lock.write()
    }

    /// Held by a query while it reads indexes and loads candidates.
    pub(crate) fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_lock.read()
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_allocation() {
        let mgr = TransactionManager::new();
        assert_eq!(mgr.begin(), TxId::new(1));
        assert_eq!(mgr.begin(), TxId::new(2));
        assert_eq!(mgr.allocate_element_id(), ElementId::new(0));
        assert_eq!(mgr.current_epoch(), EpochId::INITIAL);
        assert_eq!(mgr.next_epoch(), EpochId::new(1));
        assert_eq!(mgr.current_epoch(), EpochId::new(1));
    }

    #[test]
    fn test_recovered_continues_after_stored_state() {
        let mgr = TransactionManager::recovered(Some(ElementId::new(41)), EpochId::new(9));
        assert_eq!(mgr.allocate_element_id(), ElementId::new(42));
        assert_eq!(mgr.next_epoch(), EpochId::new(10));
        assert_eq!(mgr.committed_epoch(), EpochId::new(9));
        assert!(!mgr.removed_after(EpochId::INITIAL));
    }

    #[test]
    fn test_publish_orders_commits() {
        let mgr = TransactionManager::new();
        let start = mgr.committed_epoch();

        let epoch = mgr.next_epoch();
        mgr.mark_removals(epoch);
        assert!(mgr.removed_after(start));
        assert!(!mgr.committed_after(start));

        mgr.publish(epoch);
        assert!(mgr.committed_after(start));
        assert!(!mgr.committed_after(epoch));
        assert!(!mgr.removed_after(epoch));
    }
}
