//! Equality queries over committed elements.
//!
//! A query answers from the committed state its transaction opened at;
//! the transaction's pending mutations are not consulted for matching. If
//! a data commit has landed since, the query fails with
//! [`TransactionError::ConcurrencyConflict`]. Results are handles into the
//! transaction: an element it already loaded comes back as that same
//! handle, so reads through it show the local edits even when only the
//! committed values matched. When a composite index covers every
//! key of one of its `has` conditions the index supplies the candidates,
//! otherwise all stored elements are scanned. Either way each candidate is
//! checked against every condition, so both paths return the same
//! elements, in id order.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use strata_adapters::storage::keys::{ELEMENT_PREFIX, element_key};
use strata_common::types::{ElementKind, EpochId, Value};
use strata_common::utils::error::{Result, SchemaError, TransactionError};
use strata_core::graph::{decode_element, encode_values};
use strata_core::{CompositeIndexDef, ElementRecord};

use crate::transaction::{ElementRef, Transaction};

/// How a query finds its candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Lookup in the named composite index.
    CompositeIndex(String),
    /// Scan of every stored element.
    FullScan,
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryPlan::CompositeIndex(name) => write!(f, "composite index '{name}'"),
            QueryPlan::FullScan => f.write_str("full scan"),
        }
    }
}

/// A query builder bound to one transaction.
///
/// ```
/// # use strata_common::types::DataType;
/// # use strata_engine::StrataDB;
/// # fn main() -> strata_common::Result<()> {
/// # let db = StrataDB::new_in_memory();
/// # let mut mgmt = db.open_management()?;
/// # mgmt.make_property_key("age").data_type(DataType::Int32).make()?;
/// # mgmt.make_vertex_label("person").make()?;
/// # mgmt.commit()?;
/// let mut tx = db.new_transaction()?;
/// let adults = tx.query().has("age", 42).label("person").limit(10).vertices()?;
/// assert!(adults.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct GraphQuery<'a> {
    tx: &'a mut Transaction,
    conditions: SmallVec<[(String, Value); 2]>,
    label: Option<String>,
    limit: Option<usize>,
}

impl<'a> GraphQuery<'a> {
    pub(crate) fn new(tx: &'a mut Transaction) -> Self {
        Self {
            tx,
            conditions: SmallVec::new(),
            label: None,
            limit: None,
        }
    }

    /// Requires one of the element's values under `key` to equal `value`.
    pub fn has(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((key.to_string(), value.into()));
        self
    }

    /// Requires the element's label to be `label`.
    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Returns at most `limit` elements.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The plan used for elements of `kind`.
    ///
    /// # Errors
    ///
    /// Fails if a condition names an unknown key or a value whose type is
    /// not registered.
    pub fn plan(&self, kind: ElementKind) -> Result<QueryPlan> {
        self.encode_conditions()?;
        Ok(self.choose_index(kind).map_or(QueryPlan::FullScan, |def| {
            QueryPlan::CompositeIndex(def.name.clone())
        }))
    }

    /// Matching vertices, matched on committed values. A vertex this
    /// transaction already loaded is returned as its existing handle and
    /// reads its uncommitted values.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed, a condition is invalid, or the
    /// backend fails, and with [`TransactionError::ConcurrencyConflict`] if
    /// data was committed after the transaction opened.
    pub fn vertices(self) -> Result<Vec<ElementRef>> {
        self.run(ElementKind::Vertex)
    }

    /// Matching edges. See [`vertices`](Self::vertices).
    ///
    /// # Errors
    ///
    /// Fails if the transaction is closed, a condition is invalid, or the
    /// backend fails, and with [`TransactionError::ConcurrencyConflict`] if
    /// data was committed after the transaction opened.
    pub fn edges(self) -> Result<Vec<ElementRef>> {
        self.run(ElementKind::Edge)
    }

    fn encode_conditions(&self) -> Result<Vec<(&str, Vec<u8>)>> {
        self.conditions
            .iter()
            .map(|(key, value)| {
                if self.tx.schema.property_key(key).is_none() {
                    return Err(SchemaError::UnknownKey(key.clone()).into());
                }
                Ok((key.as_str(), self.tx.registry.encode(value)?))
            })
            .collect()
    }

    /// Widest maintained index whose keys all have a condition.
    fn choose_index(&self, kind: ElementKind) -> Option<&CompositeIndexDef> {
        let mut best: Option<&CompositeIndexDef> = None;
        let usable = self.tx.schema.indexes_for(kind).filter(|def| {
            def.keys.iter().all(|k| self.conditions.iter().any(|(c, _)| c == k))
                && self.tx.catalog.indexes().contains(&def.name)
        });
        for def in usable {
            if best.is_none_or(|b| def.keys.len() > b.keys.len()) {
                best = Some(def);
            }
        }
        best
    }

    fn run(self, kind: ElementKind) -> Result<Vec<ElementRef>> {
        self.tx.ensure_open()?;
        let frames = self.encode_conditions()?;
        let index = self.choose_index(kind).cloned();
        let registry = Arc::clone(&self.tx.registry);

        let mut candidates: Vec<(ElementRecord, EpochId)> = Vec::new();
        {
            let _read = self.tx.manager.read_guard();
            // Indexes and stored elements only hold the latest state.
            if self.tx.manager.committed_after(self.tx.start) {
                return Err(TransactionError::ConcurrencyConflict {
                    element: format!("{kind} query"),
                }
                .into());
            }
            if let Some(def) = &index {
                let key_frames: Vec<&[u8]> = def
                    .keys
                    .iter()
                    .filter_map(|k| frames.iter().find(|(c, _)| c == k).map(|(_, f)| f.as_slice()))
                    .collect();
                let ids = self
                    .tx
                    .catalog
                    .indexes()
                    .lookup(&def.name, &key_frames)
                    .unwrap_or_default();
                for id in ids {
                    if let Some(entry) = self.tx.connection.read(&element_key(id))? {
                        candidates.push((decode_element(&entry.value, &registry)?, entry.version));
                    }
                }
            } else {
                for (_, entry) in self.tx.connection.scan_prefix(ELEMENT_PREFIX)? {
                    candidates.push((decode_element(&entry.value, &registry)?, entry.version));
                }
            }
        }
        tracing::trace!(
            "query on {} via {}: {} candidates",
            kind,
            index.as_ref().map_or("full scan", |d| d.name.as_str()),
            candidates.len()
        );

        let mut matched = Vec::with_capacity(candidates.len());
        for (record, version) in candidates {
            if record.kind != kind || self.label.as_ref().is_some_and(|l| *l != record.label) {
                continue;
            }
            let mut keep = true;
            for (key, frame) in &frames {
                if !encode_values(record.values(key), &registry)?.contains(frame) {
                    keep = false;
                    break;
                }
            }
            if keep {
                matched.push((record, version));
            }
        }
        matched.sort_by_key(|(record, _)| record.id);

        let limit = self.limit.unwrap_or(usize::MAX);
        let mut results = Vec::new();
        for (record, version) in matched {
            if results.len() >= limit {
                break;
            }
            if let Some(element) = self.tx.attach(record, version) {
                results.push(element);
            }
        }
        Ok(results)
    }
}
