//! Schema management transactions.
//!
//! Schema objects are staged through builders on a
//! [`ManagementTransaction`] and become visible together when it commits:
//!
//! ```
//! use strata_common::types::{Cardinality, DataType, ElementKind};
//! use strata_engine::StrataDB;
//!
//! # fn main() -> strata_common::Result<()> {
//! let db = StrataDB::new_in_memory();
//! let mut mgmt = db.open_management()?;
//! mgmt.make_property_key("time").data_type(DataType::Int32).make()?;
//! mgmt.make_property_key("tags")
//!     .data_type(DataType::String)
//!     .cardinality(Cardinality::Set)
//!     .make()?;
//! mgmt.make_vertex_label("event").make()?;
//! mgmt.build_index("byTime", ElementKind::Vertex)
//!     .add_key("time")
//!     .build_composite_index()?;
//! mgmt.commit()?;
//!
//! assert!(db.schema().index("byTime").is_some());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use strata_adapters::storage::keys::{ELEMENT_PREFIX, SCHEMA_KEY};
use strata_adapters::{BackendConnection, Expected, WriteBatch};
use strata_common::types::{Cardinality, DataType, ElementKind, EpochId, TxId};
use strata_common::utils::error::{Error, Result, SchemaError, StorageError, TransactionError};
use strata_core::graph::decode_element;
use strata_core::{CompositeIndexDef, PropertyKeyDef, SchemaChanges, SchemaRecord, SchemaSnapshot, SerializerRegistry};

use crate::catalog::Catalog;
use crate::transaction::{TransactionManager, TxState};

/// A transaction that stages and commits schema definitions.
///
/// Independent of data transactions: data transactions opened before the
/// commit keep validating against the schema they opened with.
pub struct ManagementTransaction {
    id: TxId,
    state: TxState,
    base: Arc<SchemaSnapshot>,
    changes: SchemaChanges,
    registry: Arc<SerializerRegistry>,
    connection: Arc<BackendConnection>,
    catalog: Arc<Catalog>,
    manager: Arc<TransactionManager>,
}

impl ManagementTransaction {
    pub(crate) fn new(
        registry: Arc<SerializerRegistry>,
        connection: Arc<BackendConnection>,
        catalog: Arc<Catalog>,
        manager: Arc<TransactionManager>,
    ) -> Self {
        Self {
            id: manager.begin(),
            state: TxState::Open,
            base: catalog.snapshot(),
            changes: SchemaChanges::default(),
            registry,
            connection,
            catalog,
            manager,
        }
    }

    /// Transaction id.
    #[must_use]
    pub fn tx_id(&self) -> TxId {
        self.id
    }

    /// Returns true until commit or rollback.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == TxState::Open
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Objects staged so far.
    #[must_use]
    pub fn staged(&self) -> &SchemaChanges {
        &self.changes
    }

    /// A staged or committed property key.
    #[must_use]
    pub fn property_key(&self, name: &str) -> Option<&PropertyKeyDef> {
        self.changes
            .property_key(name)
            .or_else(|| self.base.property_key(name))
    }

    /// Returns true if `name` is taken in the property key / edge label
    /// namespace.
    #[must_use]
    pub fn contains_relation_type(&self, name: &str) -> bool {
        self.changes.relation_type(name).is_some() || self.base.relation_type(name).is_some()
    }

    /// Returns true if the vertex label is staged or committed.
    #[must_use]
    pub fn contains_vertex_label(&self, name: &str) -> bool {
        self.changes.has_vertex_label(name) || self.base.has_vertex_label(name)
    }

    /// Starts a property key definition. Defaults to [`DataType::Any`] and
    /// [`Cardinality::Single`].
    pub fn make_property_key(&mut self, name: &str) -> PropertyKeyMaker<'_> {
        PropertyKeyMaker {
            tx: self,
            name: name.to_string(),
            data_type: DataType::Any,
            cardinality: Cardinality::Single,
        }
    }

    /// Starts a vertex label definition.
    pub fn make_vertex_label(&mut self, name: &str) -> LabelMaker<'_> {
        LabelMaker {
            tx: self,
            name: name.to_string(),
            kind: ElementKind::Vertex,
        }
    }

    /// Starts an edge label definition.
    pub fn make_edge_label(&mut self, name: &str) -> LabelMaker<'_> {
        LabelMaker {
            tx: self,
            name: name.to_string(),
            kind: ElementKind::Edge,
        }
    }

    /// Starts a composite index over elements of `kind`.
    pub fn build_index(&mut self, name: &str, kind: ElementKind) -> IndexBuilder<'_> {
        IndexBuilder {
            tx: self,
            name: name.to_string(),
            kind,
            keys: Vec::new(),
        }
    }

    /// Persists every staged object atomically and publishes the new
    /// schema to transactions opened afterwards.
    ///
    /// New composite indexes are filled from committed elements before the
    /// schema becomes visible.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Conflict`] if a staged name was committed by
    /// another management transaction in the meantime, or a storage error.
    /// The transaction is rolled back in either case.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.changes.is_empty() {
            self.state = TxState::Committed;
            return Ok(());
        }
        match self.write_schema() {
            Ok(version) => {
                self.state = TxState::Committed;
                tracing::info!(
                    "schema committed at {}: {} property keys, {} vertex labels, {} edge labels, {} indexes",
                    version,
                    self.changes.property_keys.len(),
                    self.changes.vertex_labels.len(),
                    self.changes.edge_labels.len(),
                    self.changes.indexes.len()
                );
                Ok(())
            }
            Err(e) => {
                self.state = TxState::RolledBack;
                tracing::warn!("Failed to commit schema in {}: {}", self.id, e);
                Err(e)
            }
        }
    }

    /// Discards every staged object.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is already closed.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.changes = SchemaChanges::default();
        self.state = TxState::RolledBack;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == TxState::Open {
            Ok(())
        } else {
            Err(TransactionError::Closed {
                tx: self.id,
                state: self.state.name(),
            }
            .into())
        }
    }

    /// Rejects `name` if it is staged or committed as of open.
    fn check_name(&self, object: &'static str, name: &str) -> Result<()> {
        self.ensure_open()?;
        let taken = match object {
            "index" => self.changes.has_index(name) || self.base.index(name).is_some(),
            "vertex label" => self.contains_vertex_label(name),
            _ => self.contains_relation_type(name),
        };
        if taken {
            return Err(SchemaError::Conflict {
                kind: object,
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn write_schema(&self) -> Result<EpochId> {
        let _schema = self.catalog.lock_schema();
        let current = self.catalog.snapshot();
        let version = self.manager.next_epoch();
        let next = current.apply(&self.changes, version)?;
        let bytes = SchemaRecord::from_snapshot(&next, &self.registry)?.to_bytes()?;
        let mut batch = WriteBatch::new(version);
        batch.put(SCHEMA_KEY.to_vec(), bytes, Expected::from_version(current.version()));

        let _commit = (!self.changes.indexes.is_empty()).then(|| self.manager.commit_guard());
        if let Err(e) = self.backfill() {
            self.drop_new_indexes();
            return Err(e);
        }
        if let Err(e) = self.connection.write(&batch) {
            self.drop_new_indexes();
            return Err(match e {
                Error::Storage(StorageError::Conflict { key }) => {
                    TransactionError::ConcurrencyConflict { element: key }.into()
                }
                other => other,
            });
        }
        self.catalog.publish(next);
        Ok(version)
    }

    /// Registers the staged indexes and fills them from stored elements.
    fn backfill(&self) -> Result<()> {
        if self.changes.indexes.is_empty() {
            return Ok(());
        }
        for def in &self.changes.indexes {
            self.catalog.indexes().register(def.clone());
        }
        let elements = self.connection.scan_prefix(ELEMENT_PREFIX)?;
        for (_, entry) in &elements {
            let record = decode_element(&entry.value, &self.registry)?;
            for def in &self.changes.indexes {
                self.catalog.indexes().backfill(&def.name, &record, &self.registry)?;
            }
        }
        tracing::debug!(
            "backfilled {} indexes from {} elements",
            self.changes.indexes.len(),
            elements.len()
        );
        Ok(())
    }

    fn drop_new_indexes(&self) {
        for def in &self.changes.indexes {
            self.catalog.indexes().unregister(&def.name);
        }
    }
}

impl Drop for ManagementTransaction {
    fn drop(&mut self) {
        if self.state == TxState::Open && !self.changes.is_empty() {
            tracing::debug!("{} dropped with uncommitted schema changes", self.id);
        }
    }
}

/// Builder returned by [`ManagementTransaction::make_property_key`].
pub struct PropertyKeyMaker<'a> {
    tx: &'a mut ManagementTransaction,
    name: String,
    data_type: DataType,
    cardinality: Cardinality,
}

impl PropertyKeyMaker<'_> {
    /// Sets the value type.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Sets the cardinality.
    pub fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Stages the key.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Conflict`] if the name is taken by a property
    /// key or edge label, or an unregistered-type error for a custom data
    /// type without a serializer.
    pub fn make(self) -> Result<PropertyKeyDef> {
        self.tx.check_name("property key", &self.name)?;
        if let DataType::Custom(ty) = self.data_type {
            self.tx.registry.validate_type(ty)?;
        }
        let def = PropertyKeyDef {
            name: self.name,
            data_type: self.data_type,
            cardinality: self.cardinality,
        };
        self.tx.changes.property_keys.push(def.clone());
        Ok(def)
    }
}

/// Builder returned by [`ManagementTransaction::make_vertex_label`] and
/// [`ManagementTransaction::make_edge_label`].
pub struct LabelMaker<'a> {
    tx: &'a mut ManagementTransaction,
    name: String,
    kind: ElementKind,
}

impl LabelMaker<'_> {
    /// Stages the label.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Conflict`] if the name is taken in the
    /// label's namespace.
    pub fn make(self) -> Result<String> {
        match self.kind {
            ElementKind::Vertex => {
                self.tx.check_name("vertex label", &self.name)?;
                self.tx.changes.vertex_labels.push(self.name.clone());
            }
            ElementKind::Edge => {
                self.tx.check_name("edge label", &self.name)?;
                self.tx.changes.edge_labels.push(self.name.clone());
            }
        }
        Ok(self.name)
    }
}

/// Builder returned by [`ManagementTransaction::build_index`].
pub struct IndexBuilder<'a> {
    tx: &'a mut ManagementTransaction,
    name: String,
    kind: ElementKind,
    keys: Vec<String>,
}

impl IndexBuilder<'_> {
    /// Appends an indexed key.
    pub fn add_key(mut self, key: &str) -> Self {
        self.keys.push(key.to_string());
        self
    }

    /// Stages the index.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidIndex`] if no key was added, a key is
    /// repeated, or a key is neither staged nor committed, and
    /// [`SchemaError::Conflict`] if the index name is taken.
    pub fn build_composite_index(self) -> Result<CompositeIndexDef> {
        self.tx.check_name("index", &self.name)?;
        if self.keys.is_empty() {
            return Err(SchemaError::InvalidIndex(format!("index '{}' has no keys", self.name)).into());
        }
        for (i, key) in self.keys.iter().enumerate() {
            if self.keys[..i].contains(key) {
                return Err(SchemaError::InvalidIndex(format!(
                    "index '{}' lists key '{key}' twice",
                    self.name
                ))
                .into());
            }
            if self.tx.property_key(key).is_none() {
                return Err(SchemaError::InvalidIndex(format!(
                    "index '{}' refers to unknown key '{key}'",
                    self.name
                ))
                .into());
            }
        }
        let def = CompositeIndexDef {
            name: self.name,
            element_kind: self.kind,
            keys: self.keys,
        };
        self.tx.changes.indexes.push(def.clone());
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use crate::StrataDB;
    use strata_common::types::{Cardinality, DataType, ElementKind};

    #[derive(Debug, PartialEq)]
    struct Unregistered;

    #[test]
    fn test_staged_objects_are_invisible_until_commit() {
        let db = StrataDB::new_in_memory();
        let mut mgmt = db.open_management().unwrap();
        mgmt.make_property_key("time").data_type(DataType::Int32).make().unwrap();
        mgmt.make_vertex_label("event").make().unwrap();
        assert!(mgmt.property_key("time").is_some());
        assert!(db.schema().property_key("time").is_none());

        mgmt.commit().unwrap();
        assert!(!mgmt.is_open());
        let schema = db.schema();
        assert_eq!(schema.property_key("time").unwrap().cardinality, Cardinality::Single);
        assert!(schema.has_vertex_label("event"));
    }

    #[test]
    fn test_name_conflicts() {
        let db = StrataDB::new_in_memory();
        let mut mgmt = db.open_management().unwrap();
        mgmt.make_property_key("name").make().unwrap();
        mgmt.make_vertex_label("person").make().unwrap();
        mgmt.commit().unwrap();

        let mut mgmt = db.open_management().unwrap();
        let err = mgmt.make_property_key("name").make().unwrap_err();
        assert_eq!(err.to_string(), "schema error: property key 'name' is already defined");
        // Edge labels share the property key namespace.
        assert!(mgmt.make_edge_label("name").make().is_err());
        assert!(mgmt.make_vertex_label("person").make().is_err());
        // Vertex labels have their own.
        mgmt.make_vertex_label("name").make().unwrap();
        mgmt.make_edge_label("knows").make().unwrap();
        assert!(mgmt.make_edge_label("knows").make().is_err());
        mgmt.commit().unwrap();
    }

    #[test]
    fn test_commit_rechecks_against_latest_schema() {
        let db = StrataDB::new_in_memory();
        let mut first = db.open_management().unwrap();
        let mut second = db.open_management().unwrap();
        first.make_property_key("age").make().unwrap();
        second.make_property_key("age").make().unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(
            err,
            strata_common::Error::Schema(strata_common::utils::error::SchemaError::Conflict { .. })
        ));
        assert!(!second.is_open());
    }

    #[test]
    fn test_custom_data_type_must_be_registered() {
        let db = StrataDB::new_in_memory();
        let mut mgmt = db.open_management().unwrap();
        let err = mgmt
            .make_property_key("thing")
            .data_type(DataType::of::<Unregistered>())
            .make()
            .unwrap_err();
        assert!(err.is_unregistered_type());
    }

    #[test]
    fn test_index_validation() {
        let db = StrataDB::new_in_memory();
        let mut mgmt = db.open_management().unwrap();
        assert!(
            mgmt.build_index("empty", ElementKind::Vertex)
                .build_composite_index()
                .is_err()
        );
        assert!(
            mgmt.build_index("byMissing", ElementKind::Vertex)
                .add_key("missing")
                .build_composite_index()
                .is_err()
        );
        mgmt.make_property_key("time").data_type(DataType::Int32).make().unwrap();
        assert!(
            mgmt.build_index("twice", ElementKind::Vertex)
                .add_key("time")
                .add_key("time")
                .build_composite_index()
                .is_err()
        );
        let def = mgmt
            .build_index("byTime", ElementKind::Vertex)
            .add_key("time")
            .build_composite_index()
            .unwrap();
        assert_eq!(def.keys, vec!["time".to_string()]);
        assert!(
            mgmt.build_index("byTime", ElementKind::Edge)
                .add_key("time")
                .build_composite_index()
                .is_err()
        );
        mgmt.commit().unwrap();
        assert!(db.schema().index("byTime").is_some());
    }

    #[test]
    fn test_rollback_and_closed() {
        let db = StrataDB::new_in_memory();
        let mut mgmt = db.open_management().unwrap();
        mgmt.make_vertex_label("gone").make().unwrap();
        mgmt.rollback().unwrap();
        assert!(!db.schema().has_vertex_label("gone"));
        let err = mgmt.make_vertex_label("late").make().unwrap_err();
        assert!(err.is_transaction_closed());
        assert!(mgmt.commit().unwrap_err().is_transaction_closed());
    }
}
