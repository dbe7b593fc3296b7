//! Data transactions.
//!
//! A [`Transaction`] keeps every element it creates or loads in a private
//! arena and hands out [`ElementRef`]s into it. Nothing reaches the backend
//! until [`Transaction::commit`], which validates all pending mutations,
//! assigns permanent ids and writes one check-and-set batch through the
//! permanent cache.
//!
//! Reads see the committed state as of open. A load of an element written
//! by a later commit, or found missing after a later commit removed
//! elements, fails with [`TransactionError::ConcurrencyConflict`] instead
//! of mixing two states; the caller retries with a new transaction.
//!
//! ```text
//! OPEN --commit ok--> COMMITTED
//!   \----commit err / rollback--> ROLLED_BACK
//! ```

mod manager;

pub use manager::TransactionManager;

use std::fmt;
use std::sync::Arc;

use strata_adapters::storage::keys::element_key;
use strata_adapters::{BackendConnection, Expected, WriteBatch};
use strata_common::types::{Cardinality, ElementId, ElementKind, EpochId, TxId, Value};
use strata_common::utils::error::{Error, Result, SchemaError, StorageError, TransactionError};
use strata_common::utils::hash::FxHashMap;
use strata_core::graph::{decode_element, encode_element};
use strata_core::{ElementRecord, IndexDelta, SchemaSnapshot, SerializerRegistry};

use crate::catalog::Catalog;
use crate::query::GraphQuery;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Accepting reads and mutations.
    Open,
    /// Committed; terminal.
    Committed,
    /// Rolled back, explicitly or by a failed commit; terminal.
    RolledBack,
}

impl TxState {
    /// Lower-case name used in error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TxState::Open => "open",
            TxState::Committed => "committed",
            TxState::RolledBack => "rolled back",
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle to a vertex or edge inside one transaction.
///
/// Only valid with the transaction that returned it. New elements have no
/// permanent id until commit; the handle is their provisional identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef {
    tx: TxId,
    slot: usize,
    kind: ElementKind,
}

impl ElementRef {
    /// Owning transaction.
    #[must_use]
    pub fn tx(self) -> TxId {
        self.tx
    }

    /// Vertex or edge.
    #[must_use]
    pub fn kind(self) -> ElementKind {
        self.kind
    }

    /// Returns true for a vertex.
    #[must_use]
    pub fn is_vertex(self) -> bool {
        self.kind == ElementKind::Vertex
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.tx, self.kind, self.slot)
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    epoch: Option<EpochId>,
    assigned: Vec<(ElementRef, ElementId)>,
    writes: usize,
}

impl CommitSummary {
    /// Epoch of the written batch, `None` if nothing was written.
    #[must_use]
    pub fn epoch(&self) -> Option<EpochId> {
        self.epoch
    }

    /// Permanent id assigned to a new element.
    #[must_use]
    pub fn id_of(&self, element: ElementRef) -> Option<ElementId> {
        self.assigned
            .iter()
            .find(|(r, _)| *r == element)
            .map(|(_, id)| *id)
    }

    /// Every new element with its permanent id, in creation order.
    #[must_use]
    pub fn assigned(&self) -> &[(ElementRef, ElementId)] {
        &self.assigned
    }

    /// Number of element puts and deletes written.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes
    }
}

struct Loaded {
    version: EpochId,
    original: ElementRecord,
}

struct Slot {
    record: ElementRecord,
    pending_endpoints: Option<(usize, usize)>,
    loaded: Option<Loaded>,
    dirty: bool,
    removed: bool,
}

impl Slot {
    fn new(record: ElementRecord, pending_endpoints: Option<(usize, usize)>) -> Self {
        Self {
            record,
            pending_endpoints,
            loaded: None,
            dirty: true,
            removed: false,
        }
    }

    fn loaded(record: ElementRecord, version: EpochId) -> Self {
        Self {
            loaded: Some(Loaded {
                version,
                original: record.clone(),
            }),
            record,
            pending_endpoints: None,
            dirty: false,
            removed: false,
        }
    }
}

/// A unit of work over vertices, edges and their properties.
///
/// Mutations are validated as they are made and again at commit. A
/// property write that fails validation makes the transaction
/// rollback-only: every later mutation returns the same error and
/// [`commit`](Self::commit) rolls back and surfaces it.
///
/// # Examples
///
/// ```
/// use strata_common::types::{Cardinality, DataType};
/// use strata_engine::StrataDB;
///
/// # fn main() -> strata_common::Result<()> {
/// let db = StrataDB::new_in_memory();
/// let mut mgmt = db.open_management()?;
/// mgmt.make_property_key("name").data_type(DataType::String).make()?;
/// mgmt.make_vertex_label("person").make()?;
/// mgmt.commit()?;
///
/// let mut tx = db.new_transaction()?;
/// let v = tx.add_vertex("person")?;
/// tx.property(v, "name", "ada")?;
/// let summary = tx.commit()?;
/// assert!(summary.id_of(v).is_some());
/// # Ok(())
/// # }
/// ```
pub struct Transaction {
    id: TxId,
    state: TxState,
    rollback_cause: Option<Error>,
    pub(crate) start: EpochId,
    pub(crate) schema: Arc<SchemaSnapshot>,
    pub(crate) registry: Arc<SerializerRegistry>,
    pub(crate) connection: Arc<BackendConnection>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) manager: Arc<TransactionManager>,
    slots: Vec<Slot>,
    by_id: FxHashMap<ElementId, usize>,
}

impl Transaction {
    pub(crate) fn new(
        registry: Arc<SerializerRegistry>,
        connection: Arc<BackendConnection>,
        catalog: Arc<Catalog>,
        manager: Arc<TransactionManager>,
    ) -> Self {
        let id = manager.begin();
        let schema = catalog.snapshot();
        let start = manager.committed_epoch();
        tracing::trace!("{} opened at {} with schema {:?}", id, start, schema.version());
        Self {
            id,
            state: TxState::Open,
            rollback_cause: None,
            start,
            schema,
            registry,
            connection,
            catalog,
            manager,
            slots: Vec::new(),
            by_id: FxHashMap::default(),
        }
    }

    /// Transaction id.
    #[must_use]
    pub fn tx_id(&self) -> TxId {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Returns true until commit or rollback.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == TxState::Open
    }

    /// Returns true if a failed validation doomed this transaction.
    #[must_use]
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_cause.is_some()
    }

    /// Last data commit this transaction reads from.
    #[must_use]
    pub fn start_epoch(&self) -> EpochId {
        self.start
    }

    /// The schema this transaction validates against, fixed at open.
    #[must_use]
    pub fn schema(&self) -> &SchemaSnapshot {
        &self.schema
    }

    // === Mutations ===

    /// Creates a vertex with a committed vertex label.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or rollback-only, or the label is
    /// not a committed vertex label.
    pub fn add_vertex(&mut self, label: &str) -> Result<ElementRef> {
        self.ensure_writable()?;
        check_label(&self.schema, ElementKind::Vertex, label)?;
        let record = ElementRecord::vertex(ElementId::INVALID, label);
        Ok(self.push(Slot::new(record, None)))
    }

    /// Creates an edge from `out` to `into`.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or rollback-only, the label is
    /// not a committed edge label, or an endpoint is not a live vertex of
    /// this transaction.
    pub fn add_edge(&mut self, label: &str, out: ElementRef, into: ElementRef) -> Result<ElementRef> {
        self.ensure_writable()?;
        check_label(&self.schema, ElementKind::Edge, label)?;
        let out = self.vertex_slot(out)?;
        let into = self.vertex_slot(into)?;
        let record = ElementRecord::edge(ElementId::INVALID, label, ElementId::INVALID, ElementId::INVALID);
        Ok(self.push(Slot::new(record, Some((out, into)))))
    }

    /// Writes `value` under `key`, combined with existing values according
    /// to the key's cardinality.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownKey`] if the key is not committed,
    /// an unregistered-type error if the value's exact type has no
    /// serializer, or [`SchemaError::DataTypeMismatch`] if the key declares
    /// another type. Each of these makes the transaction rollback-only.
    pub fn property(&mut self, element: ElementRef, key: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_writable()?;
        let idx = self.slot_index(element)?;
        let value = value.into();
        let cardinality = match check_property(&self.schema, &self.registry, key, &value) {
            Ok(cardinality) => cardinality,
            Err(e) => {
                self.mark_rollback_only(&e);
                return Err(e);
            }
        };
        let slot = &mut self.slots[idx];
        if slot.record.properties.apply(key, cardinality, value) {
            slot.dirty = true;
        }
        Ok(())
    }

    /// Removes every value under `key`. Returns false if there were none.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or rollback-only, or the element
    /// is not live in this transaction.
    pub fn remove_property(&mut self, element: ElementRef, key: &str) -> Result<bool> {
        self.ensure_writable()?;
        let idx = self.slot_index(element)?;
        let slot = &mut self.slots[idx];
        let removed = slot.record.properties.remove(key).is_some();
        slot.dirty |= removed;
        Ok(removed)
    }

    /// Deletes an element. Edges of a removed vertex are left alone.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or rollback-only, or the element
    /// is not live in this transaction.
    pub fn remove(&mut self, element: ElementRef) -> Result<()> {
        self.ensure_writable()?;
        let idx = self.slot_index(element)?;
        let slot = &mut self.slots[idx];
        slot.removed = true;
        slot.dirty = true;
        Ok(())
    }

    // === Reads ===

    /// Loads a committed vertex through the permanent cache.
    ///
    /// Returns the existing handle if it is already loaded, and `None` if
    /// no such vertex is committed or it was removed in this transaction.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or the backend read fails, and
    /// with [`TransactionError::ConcurrencyConflict`] if the vertex changed
    /// after this transaction opened.
    pub fn vertex(&mut self, id: ElementId) -> Result<Option<ElementRef>> {
        self.load(id, ElementKind::Vertex)
    }

    /// Loads a committed edge through the permanent cache.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or the backend read fails, and
    /// with [`TransactionError::ConcurrencyConflict`] if the edge changed
    /// after this transaction opened.
    pub fn edge(&mut self, id: ElementId) -> Result<Option<ElementRef>> {
        self.load(id, ElementKind::Edge)
    }

    /// First value under `key`.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or the element is not live.
    pub fn value(&self, element: ElementRef, key: &str) -> Result<Option<&Value>> {
        Ok(self.slot(element)?.record.properties.get(key))
    }

    /// All values under `key`, empty if none.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or the element is not live.
    pub fn values(&self, element: ElementRef, key: &str) -> Result<&[Value]> {
        Ok(self.slot(element)?.record.properties.values(key))
    }

    /// Keys with at least one value, in first-write order.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or the element is not live.
    pub fn keys(&self, element: ElementRef) -> Result<Vec<&str>> {
        Ok(self.slot(element)?.record.properties.keys().collect())
    }

    /// Label of the element.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or the element is not live.
    pub fn label(&self, element: ElementRef) -> Result<&str> {
        Ok(&self.slot(element)?.record.label)
    }

    /// Permanent id, `None` for an element created by this transaction.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed or the element is not live.
    pub fn id(&self, element: ElementRef) -> Result<Option<ElementId>> {
        let id = self.slot(element)?.record.id;
        Ok(id.is_valid().then_some(id))
    }

    /// `(out, in)` vertices of an edge, loading committed ones as needed.
    ///
    /// # Errors
    ///
    /// Fails if `edge` is not a live edge or an endpoint vertex no longer
    /// exists.
    pub fn endpoints(&mut self, edge: ElementRef) -> Result<(ElementRef, ElementRef)> {
        self.ensure_open()?;
        let idx = self.slot_index(edge)?;
        let slot = &self.slots[idx];
        if slot.record.kind != ElementKind::Edge {
            return Err(TransactionError::InvalidState(format!("{edge} is not an edge")).into());
        }
        if let Some((out, into)) = slot.pending_endpoints {
            return Ok((self.element_ref(out), self.element_ref(into)));
        }
        let (out, into) = slot
            .record
            .endpoints
            .ok_or_else(|| Error::Internal(format!("stored edge {} has no endpoints", slot.record.id)))?;
        let out = self
            .vertex(out)?
            .ok_or_else(|| TransactionError::ElementRemoved(out.to_string()))?;
        let into = self
            .vertex(into)?
            .ok_or_else(|| TransactionError::ElementRemoved(into.to_string()))?;
        Ok((out, into))
    }

    /// Starts a query over committed elements.
    pub fn query(&mut self) -> GraphQuery<'_> {
        GraphQuery::new(self)
    }

    // === Completion ===

    /// Validates and writes every pending mutation as one atomic batch.
    ///
    /// On any failure the transaction ends rolled back and nothing it did
    /// is visible.
    ///
    /// # Errors
    ///
    /// Returns the validation error that made the transaction
    /// rollback-only, a validation error found now,
    /// [`TransactionError::ConcurrencyConflict`] if another transaction
    /// committed one of the touched elements first, or a backend error.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        self.ensure_open()?;
        if let Some(cause) = self.rollback_cause.take() {
            self.finish(TxState::RolledBack);
            tracing::debug!("{} rolled back at commit: {}", self.id, cause);
            return Err(cause);
        }
        match self.write_changes() {
            Ok(summary) => {
                self.finish(TxState::Committed);
                tracing::debug!(
                    "{} committed {} writes at {:?}",
                    self.id,
                    summary.writes,
                    summary.epoch
                );
                Ok(summary)
            }
            Err(e) => {
                self.finish(TxState::RolledBack);
                if e.is_concurrency_conflict() {
                    tracing::debug!("{} lost a commit race: {}", self.id, e);
                } else {
                    tracing::warn!("Failed to commit {}: {}", self.id, e);
                }
                Err(e)
            }
        }
    }

    /// Discards every pending mutation. The backend and cache are not
    /// touched.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is already closed.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.finish(TxState::RolledBack);
        tracing::debug!("{} rolled back", self.id);
        Ok(())
    }

    // === Internals ===

    /// Adds a committed element to the arena, or returns the handle it
    /// already has. `None` if it was removed in this transaction.
    pub(crate) fn attach(&mut self, record: ElementRecord, version: EpochId) -> Option<ElementRef> {
        if let Some(&idx) = self.by_id.get(&record.id) {
            return (!self.slots[idx].removed).then(|| self.element_ref(idx));
        }
        let id = record.id;
        let element = self.push(Slot::loaded(record, version));
        self.by_id.insert(id, element.slot);
        Some(element)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
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

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        match &self.rollback_cause {
            None => Ok(()),
            Some(cause) => Err(cause.clone_validation().unwrap_or_else(|| {
                TransactionError::InvalidState("transaction is rollback-only".to_string()).into()
            })),
        }
    }

    fn mark_rollback_only(&mut self, err: &Error) {
        if self.rollback_cause.is_none()
            && let Some(cause) = err.clone_validation()
        {
            tracing::debug!("{} is now rollback-only: {}", self.id, cause);
            self.rollback_cause = Some(cause);
        }
    }

    fn finish(&mut self, state: TxState) {
        self.state = state;
        self.rollback_cause = None;
        self.slots.clear();
        self.by_id.clear();
    }

    fn load(&mut self, id: ElementId, kind: ElementKind) -> Result<Option<ElementRef>> {
        self.ensure_open()?;
        if let Some(&idx) = self.by_id.get(&id) {
            let slot = &self.slots[idx];
            return Ok((!slot.removed && slot.record.kind == kind).then(|| self.element_ref(idx)));
        }
        let Some(entry) = self.connection.read(&element_key(id))? else {
            if self.manager.removed_after(self.start) {
                return Err(TransactionError::conflict_on(id).into());
            }
            return Ok(None);
        };
        if entry.version > self.start {
            return Err(TransactionError::conflict_on(id).into());
        }
        let record = decode_element(&entry.value, &self.registry)?;
        Ok(self.attach(record, entry.version).filter(|r| r.kind == kind))
    }

    fn push(&mut self, slot: Slot) -> ElementRef {
        let element = ElementRef {
            tx: self.id,
            slot: self.slots.len(),
            kind: slot.record.kind,
        };
        self.slots.push(slot);
        element
    }

    fn element_ref(&self, idx: usize) -> ElementRef {
        ElementRef {
            tx: self.id,
            slot: idx,
            kind: self.slots[idx].record.kind,
        }
    }

    fn slot_index(&self, element: ElementRef) -> Result<usize> {
        if element.tx != self.id {
            return Err(TransactionError::ForeignElement {
                owner: element.tx,
                tx: self.id,
            }
            .into());
        }
        let slot = self
            .slots
            .get(element.slot)
            .ok_or_else(|| TransactionError::InvalidState(format!("no element behind {element}")))?;
        if slot.removed {
            return Err(TransactionError::ElementRemoved(element.to_string()).into());
        }
        Ok(element.slot)
    }

    fn slot(&self, element: ElementRef) -> Result<&Slot> {
        self.ensure_open()?;
        let idx = self.slot_index(element)?;
        Ok(&self.slots[idx])
    }

    fn vertex_slot(&self, element: ElementRef) -> Result<usize> {
        let idx = self.slot_index(element)?;
        if self.slots[idx].record.kind != ElementKind::Vertex {
            return Err(TransactionError::InvalidState(format!("{element} is not a vertex")).into());
        }
        Ok(idx)
    }

    /// Re-checks labels of new elements and every value that differs from
    /// committed state.
    fn revalidate(&self) -> Result<()> {
        for slot in self.slots.iter().filter(|s| s.dirty && !s.removed) {
            let original = slot.loaded.as_ref().map(|l| &l.original);
            if original.is_none() {
                check_label(&self.schema, slot.record.kind, &slot.record.label)?;
            }
            for (key, values) in slot.record.properties.iter() {
                if original.is_some_and(|o| o.values(key) == values) {
                    continue;
                }
                for value in values {
                    check_property(&self.schema, &self.registry, key, value)?;
                }
            }
        }
        Ok(())
    }

    fn write_changes(&mut self) -> Result<CommitSummary> {
        self.revalidate()?;

        let mut summary = CommitSummary::default();
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.loaded.is_none() && !slot.removed {
                let id = self.manager.allocate_element_id();
                slot.record.id = id;
                let element = ElementRef {
                    tx: self.id,
                    slot: idx,
                    kind: slot.record.kind,
                };
                summary.assigned.push((element, id));
            }
        }
        for idx in 0..self.slots.len() {
            let slot = &self.slots[idx];
            if slot.removed {
                continue;
            }
            let Some((out, into)) = slot.pending_endpoints else {
                continue;
            };
            let endpoints = (self.committed_id(out)?, self.committed_id(into)?);
            self.slots[idx].record.endpoints = Some(endpoints);
        }

        let mut batch = WriteBatch::new(EpochId::INITIAL);
        let mut moves: Vec<(Option<&ElementRecord>, Option<&ElementRecord>)> = Vec::new();
        let mut removes = false;
        for slot in &self.slots {
            let key = element_key(slot.record.id);
            match (&slot.loaded, slot.removed) {
                (None, true) => {}
                (None, false) => {
                    let bytes = encode_element(&slot.record, &self.registry)?;
                    batch.put(key, bytes, Expected::Absent);
                    moves.push((None, Some(&slot.record)));
                }
                (Some(loaded), true) => {
                    batch.delete(key, Expected::Version(loaded.version));
                    moves.push((Some(&loaded.original), None));
                    removes = true;
                }
                (Some(loaded), false) if slot.dirty => {
                    let bytes = encode_element(&slot.record, &self.registry)?;
                    batch.put(key, bytes, Expected::Version(loaded.version));
                    moves.push((Some(&loaded.original), Some(&slot.record)));
                }
                (Some(_), false) => {}
            }
        }
        if batch.is_empty() {
            return Ok(summary);
        }

        let _commit = self.manager.commit_guard();
        let mut delta = IndexDelta::default();
        for (old, new) in moves {
            self.catalog.indexes().plan(&mut delta, old, new, &self.registry)?;
        }
        batch.version = self.manager.next_epoch();
        if removes {
            self.manager.mark_removals(batch.version);
        }
        self.connection.write(&batch).map_err(|e| match e {
            Error::Storage(StorageError::Conflict { key }) => {
                TransactionError::ConcurrencyConflict { element: key }.into()
            }
            other => other,
        })?;
        self.catalog.indexes().apply(delta);
        self.manager.publish(batch.version);

        summary.epoch = Some(batch.version);
        summary.writes = batch.len();
        Ok(summary)
    }

    fn committed_id(&self, idx: usize) -> Result<ElementId> {
        let record = &self.slots[idx].record;
        if record.id.is_valid() {
            Ok(record.id)
        } else {
            Err(TransactionError::ElementRemoved(self.element_ref(idx).to_string()).into())
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("rollback_only", &self.rollback_cause.is_some())
            .field("elements", &self.slots.len())
            .finish_non_exhaustive()
    }
}

fn check_label(schema: &SchemaSnapshot, kind: ElementKind, label: &str) -> Result<()> {
    if schema.has_label(kind, label) {
        return Ok(());
    }
    let (other, expected) = match kind {
        ElementKind::Vertex => (ElementKind::Edge, "vertex"),
        ElementKind::Edge => (ElementKind::Vertex, "edge"),
    };
    if schema.has_label(other, label) {
        return Err(SchemaError::LabelKindMismatch {
            name: label.to_string(),
            expected,
        }
        .into());
    }
    Err(SchemaError::UnknownLabel(label.to_string()).into())
}

/// Checks one value against its key and the registry, in that order.
fn check_property(
    schema: &SchemaSnapshot,
    registry: &SerializerRegistry,
    key: &str,
    value: &Value,
) -> Result<Cardinality> {
    let def = schema
        .property_key(key)
        .ok_or_else(|| SchemaError::UnknownKey(key.to_string()))?;
    registry.validate(value)?;
    if !def.data_type.accepts(value) {
        return Err(SchemaError::DataTypeMismatch {
            key: key.to_string(),
            expected: def.data_type.name(),
            found: value.type_name(),
        }
        .into());
    }
    Ok(def.cardinality)
}
