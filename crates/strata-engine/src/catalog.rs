//! Committed schema and the composite indexes that follow it.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use strata_adapters::BackendConnection;
use strata_adapters::storage::keys::{ELEMENT_PREFIX, SCHEMA_KEY, parse_element_key};
use strata_common::types::{ElementId, EpochId};
use strata_common::utils::error::Result;
use strata_core::graph::decode_element;
use strata_core::{CompositeIndexStore, SchemaRecord, SchemaSnapshot, SerializerRegistry};

/// Highest ids found while loading a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovered {
    /// Highest stored element id.
    pub max_element: Option<ElementId>,
    /// Highest epoch of any stored record.
    pub max_epoch: EpochId,
}

/// Schema catalog of one database.
///
/// Holds the latest committed [`SchemaSnapshot`] and the in-memory
/// composite indexes. Data transactions clone the snapshot `Arc` when they
/// open and never see a later one.
pub struct Catalog {
    schema: RwLock<Arc<SchemaSnapshot>>,
    indexes: CompositeIndexStore,
    schema_commit: Mutex<()>,
}

impl Catalog {
    /// A catalog with no schema.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            schema: RwLock::new(Arc::new(SchemaSnapshot::empty())),
            indexes: CompositeIndexStore::new(),
            schema_commit: Mutex::new(()),
        }
    }

    /// Loads the schema record and rebuilds every composite index from a
    /// scan of stored elements.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or a stored record cannot be
    /// decoded with `registry`.
    pub fn load(connection: &BackendConnection, registry: &SerializerRegistry) -> Result<(Self, Recovered)> {
        let catalog = Self::empty();
        let mut max_epoch = EpochId::INITIAL;

        if let Some(entry) = connection.read(SCHEMA_KEY)? {
            let snapshot = SchemaRecord::from_bytes(&entry.value)?.into_snapshot(entry.version, registry)?;
            for def in snapshot.indexes() {
                catalog.indexes.register(def.clone());
            }
            max_epoch = entry.version;
            *catalog.schema.write() = Arc::new(snapshot);
        }

        let mut max_element = None;
        let elements = connection.scan_prefix(ELEMENT_PREFIX)?;
        for (key, entry) in &elements {
            max_epoch = max_epoch.max(entry.version);
            if let Some(id) = parse_element_key(key) {
                max_element = max_element.max(Some(id));
            }
            if !catalog.indexes.is_empty() {
                let record = decode_element(&entry.value, registry)?;
                catalog.indexes.update(None, Some(&record), registry)?;
            }
        }

        tracing::debug!(
            "loaded catalog from {}: {} schema objects, {} elements, {} indexes",
            connection.id(),
            catalog.schema.read().len(),
            elements.len(),
            catalog.indexes.len()
        );

        Ok((
            catalog,
            Recovered {
                max_element,
                max_epoch,
            },
        ))
    }

    /// The latest committed schema.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SchemaSnapshot> {
        Arc::clone(&self.schema.read())
    }

    /// Composite indexes.
    #[must_use]
    pub fn indexes(&self) -> &CompositeIndexStore {
        &self.indexes
    }

    /// Makes `snapshot` visible to transactions opened from now on.
    pub(crate) fn publish(&self, snapshot: SchemaSnapshot) {
        *self.schema.write() = Arc::new(snapshot);
    }

    /// Serializes schema commits of this process.
    pub(crate) fn lock_schema(&self) -> MutexGuard<'_, ()> {
        self.schema_commit.lock()
    }
}
