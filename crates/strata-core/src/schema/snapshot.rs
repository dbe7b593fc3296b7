//! Immutable view of committed schema.

use indexmap::{IndexMap, IndexSet};
use strata_common::types::{ElementKind, EpochId};
use strata_common::utils::error::{Result, SchemaError};

use super::definition::{CompositeIndexDef, PropertyKeyDef, SchemaChanges};

/// Committed schema as of one management commit.
///
/// Snapshots are never mutated. A management commit builds the next
/// snapshot with [`apply`](Self::apply) and swaps it in; data transactions
/// keep the snapshot they opened with.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    version: Option<EpochId>,
    property_keys: IndexMap<String, PropertyKeyDef>,
    vertex_labels: IndexSet<String>,
    edge_labels: IndexSet<String>,
    indexes: IndexMap<String, CompositeIndexDef>,
}

impl SchemaSnapshot {
    /// An empty schema that was never persisted.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Storage version of the schema record this snapshot was read from or
    /// written as. `None` if nothing was persisted yet.
    #[must_use]
    pub fn version(&self) -> Option<EpochId> {
        self.version
    }

    /// Looks up a property key.
    #[must_use]
    pub fn property_key(&self, name: &str) -> Option<&PropertyKeyDef> {
        self.property_keys.get(name)
    }

    /// All property keys, in definition order.
    pub fn property_keys(&self) -> impl Iterator<Item = &PropertyKeyDef> {
        self.property_keys.values()
    }

    /// Returns true if the vertex label is committed.
    #[must_use]
    pub fn has_vertex_label(&self, name: &str) -> bool {
        self.vertex_labels.contains(name)
    }

    /// Returns true if the edge label is committed.
    #[must_use]
    pub fn has_edge_label(&self, name: &str) -> bool {
        self.edge_labels.contains(name)
    }

    /// Returns true if a label of the given kind is committed.
    #[must_use]
    pub fn has_label(&self, kind: ElementKind, name: &str) -> bool {
        match kind {
            ElementKind::Vertex => self.has_vertex_label(name),
            ElementKind::Edge => self.has_edge_label(name),
        }
    }

    /// Vertex labels, in definition order.
    pub fn vertex_labels(&self) -> impl Iterator<Item = &str> {
        self.vertex_labels.iter().map(String::as_str)
    }

    /// Edge labels, in definition order.
    pub fn edge_labels(&self) -> impl Iterator<Item = &str> {
        self.edge_labels.iter().map(String::as_str)
    }

    /// Looks up a composite index.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&CompositeIndexDef> {
        self.indexes.get(name)
    }

    /// All composite indexes, in definition order.
    pub fn indexes(&self) -> impl Iterator<Item = &CompositeIndexDef> {
        self.indexes.values()
    }

    /// Composite indexes covering elements of `kind`.
    pub fn indexes_for(&self, kind: ElementKind) -> impl Iterator<Item = &CompositeIndexDef> {
        self.indexes.values().filter(move |i| i.element_kind == kind)
    }

    /// Kind of the committed object holding `name` in the shared
    /// property-key/edge-label namespace.
    #[must_use]
    pub fn relation_type(&self, name: &str) -> Option<&'static str> {
        if self.property_keys.contains_key(name) {
            Some("property key")
        } else if self.edge_labels.contains(name) {
            Some("edge label")
        } else {
            None
        }
    }

    /// Number of schema objects of every kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.property_keys.len() + self.vertex_labels.len() + self.edge_labels.len() + self.indexes.len()
    }

    /// Returns true if nothing is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails if any staged name is already committed.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Conflict`] naming the first collision.
    pub fn check_changes(&self, changes: &SchemaChanges) -> Result<()> {
        let relation_names = changes
            .property_keys
            .iter()
            .map(|k| (k.name.as_str(), "property key"))
            .chain(changes.edge_labels.iter().map(|l| (l.as_str(), "edge label")));
        for (name, kind) in relation_names {
            if self.relation_type(name).is_some() {
                return Err(conflict(kind, name));
            }
        }
        for label in &changes.vertex_labels {
            if self.vertex_labels.contains(label) {
                return Err(conflict("vertex label", label));
            }
        }
        for index in &changes.indexes {
            if self.indexes.contains_key(&index.name) {
                return Err(conflict("index", &index.name));
            }
        }
        Ok(())
    }

    /// Builds the snapshot that results from committing `changes` at
    /// `version`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Conflict`] on a name collision and
    /// [`SchemaError::InvalidIndex`] if an index names a key that is
    /// neither committed nor staged.
    pub fn apply(&self, changes: &SchemaChanges, version: EpochId) -> Result<Self> {
        self.check_changes(changes)?;
        let mut next = self.clone();
        next.version = Some(version);
        for key in &changes.property_keys {
            next.property_keys.insert(key.name.clone(), key.clone());
        }
        next.vertex_labels.extend(changes.vertex_labels.iter().cloned());
        next.edge_labels.extend(changes.edge_labels.iter().cloned());
        for index in &changes.indexes {
            if index.keys.is_empty() {
                return Err(SchemaError::InvalidIndex(format!(
                    "index '{}' has no keys",
                    index.name
                ))
                .into());
            }
            if let Some(missing) = index.keys.iter().find(|k| !next.property_keys.contains_key(*k)) {
                return Err(SchemaError::InvalidIndex(format!(
                    "index '{}' refers to unknown key '{missing}'",
                    index.name
                ))
                .into());
            }
            next.indexes.insert(index.name.clone(), index.clone());
        }
        Ok(next)
    }

    pub(crate) fn from_parts(
        version: Option<EpochId>,
        property_keys: Vec<PropertyKeyDef>,
        vertex_labels: Vec<String>,
        edge_labels: Vec<String>,
        indexes: Vec<CompositeIndexDef>,
    ) -> Self {
        Self {
            version,
            property_keys: property_keys.into_iter().map(|k| (k.name.clone(), k)).collect(),
            vertex_labels: vertex_labels.into_iter().collect(),
            edge_labels: edge_labels.into_iter().collect(),
            indexes: indexes.into_iter().map(|i| (i.name.clone(), i)).collect(),
        }
    }
}

fn conflict(kind: &'static str, name: &str) -> strata_common::Error {
    SchemaError::Conflict {
        kind,
        name: name.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::{Cardinality, DataType};

    fn key(name: &str, data_type: DataType) -> PropertyKeyDef {
        PropertyKeyDef {
            name: name.to_string(),
            data_type,
            cardinality: Cardinality::Single,
        }
    }

    fn base() -> SchemaSnapshot {
        let changes = SchemaChanges {
            property_keys: vec![key("time", DataType::Int32)],
            vertex_labels: vec!["person".into()],
            edge_labels: vec!["knows".into()],
            indexes: vec![CompositeIndexDef {
                name: "byTime".into(),
                element_kind: ElementKind::Vertex,
                keys: vec!["time".into()],
            }],
        };
        SchemaSnapshot::empty()
            .apply(&changes, EpochId::new(1))
            .unwrap()
    }

    #[test]
    fn test_apply_builds_new_snapshot() {
        let empty = SchemaSnapshot::empty();
        let next = base();
        assert!(empty.is_empty());
        assert_eq!(next.version(), Some(EpochId::new(1)));
        assert!(next.property_key("time").is_some());
        assert!(next.has_label(ElementKind::Vertex, "person"));
        assert!(next.has_label(ElementKind::Edge, "knows"));
        assert!(!next.has_label(ElementKind::Edge, "person"));
        assert_eq!(next.indexes_for(ElementKind::Vertex).count(), 1);
        assert_eq!(next.indexes_for(ElementKind::Edge).count(), 0);
    }

    #[test]
    fn test_shared_relation_namespace() {
        let schema = base();
        let changes = SchemaChanges {
            edge_labels: vec!["time".into()],
            ..SchemaChanges::default()
        };
        let err = schema.check_changes(&changes).unwrap_err();
        assert_eq!(err.to_string(), "schema error: edge label 'time' is already defined");

        // Vertex labels have their own namespace
        let changes = SchemaChanges {
            vertex_labels: vec!["time".into()],
            ..SchemaChanges::default()
        };
        assert!(schema.check_changes(&changes).is_ok());
    }

    #[test]
    fn test_index_needs_known_keys() {
        let changes = SchemaChanges {
            indexes: vec![CompositeIndexDef {
                name: "byAge".into(),
                element_kind: ElementKind::Vertex,
                keys: vec!["age".into()],
            }],
            ..SchemaChanges::default()
        };
        let err = base().apply(&changes, EpochId::new(2)).unwrap_err();
        assert!(err.to_string().contains("unknown key 'age'"));
    }

    #[test]
    fn test_duplicate_index_name() {
        let changes = SchemaChanges {
            indexes: vec![CompositeIndexDef {
                name: "byTime".into(),
                element_kind: ElementKind::Edge,
                keys: vec!["time".into()],
            }],
            ..SchemaChanges::default()
        };
        assert!(base().apply(&changes, EpochId::new(2)).is_err());
    }
}
