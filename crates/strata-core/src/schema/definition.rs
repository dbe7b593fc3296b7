//! Schema object definitions.

use strata_common::types::{Cardinality, DataType, ElementKind};

/// A committed or staged property key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyKeyDef {
    /// Unique name, shared namespace with edge labels.
    pub name: String,
    /// Declared value type.
    pub data_type: DataType,
    /// How many values an element may hold under this key.
    pub cardinality: Cardinality,
}

/// A composite equality index over one or more property keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeIndexDef {
    /// Unique index name.
    pub name: String,
    /// Which elements the index covers.
    pub element_kind: ElementKind,
    /// Indexed keys, in order.
    pub keys: Vec<String>,
}

impl CompositeIndexDef {
    /// Returns true if `key` is one of the indexed keys.
    #[must_use]
    pub fn covers(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Schema objects staged by a management transaction.
#[derive(Debug, Clone, Default)]
pub struct SchemaChanges {
    /// New property keys.
    pub property_keys: Vec<PropertyKeyDef>,
    /// New vertex labels.
    pub vertex_labels: Vec<String>,
    /// New edge labels.
    pub edge_labels: Vec<String>,
    /// New composite indexes.
    pub indexes: Vec<CompositeIndexDef>,
}

impl SchemaChanges {
    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.property_keys.is_empty()
            && self.vertex_labels.is_empty()
            && self.edge_labels.is_empty()
            && self.indexes.is_empty()
    }

    /// Looks up a staged property key.
    #[must_use]
    pub fn property_key(&self, name: &str) -> Option<&PropertyKeyDef> {
        self.property_keys.iter().find(|k| k.name == name)
    }

    /// Returns the kind of staged object holding `name` in the
    /// property-key/edge-label namespace.
    #[must_use]
    pub fn relation_type(&self, name: &str) -> Option<&'static str> {
        if self.property_key(name).is_some() {
            Some("property key")
        } else if self.edge_labels.iter().any(|l| l == name) {
            Some("edge label")
        } else {
            None
        }
    }

    /// Returns true if a vertex label with this name is staged.
    #[must_use]
    pub fn has_vertex_label(&self, name: &str) -> bool {
        self.vertex_labels.iter().any(|l| l == name)
    }

    /// Returns true if an index with this name is staged.
    #[must_use]
    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.iter().any(|i| i.name == name)
    }
}
