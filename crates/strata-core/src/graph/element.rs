//! Committed element state.

use strata_common::types::{ElementId, ElementKind, Value};

use super::property::PropertyMap;

/// A vertex or edge as stored in the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    /// Permanent id.
    pub id: ElementId,
    /// Vertex or edge.
    pub kind: ElementKind,
    /// Label name.
    pub label: String,
    /// `(out, in)` vertices for edges, `None` for vertices.
    pub endpoints: Option<(ElementId, ElementId)>,
    /// Property values.
    pub properties: PropertyMap,
}

impl ElementRecord {
    /// Creates a vertex record with no properties.
    #[must_use]
    pub fn vertex(id: ElementId, label: impl Into<String>) -> Self {
        Self {
            id,
            kind: ElementKind::Vertex,
            label: label.into(),
            endpoints: None,
            properties: PropertyMap::new(),
        }
    }

    /// Creates an edge record with no properties.
    #[must_use]
    pub fn edge(id: ElementId, label: impl Into<String>, out: ElementId, into: ElementId) -> Self {
        Self {
            id,
            kind: ElementKind::Edge,
            label: label.into(),
            endpoints: Some((out, into)),
            properties: PropertyMap::new(),
        }
    }

    /// All values under `key`.
    #[must_use]
    pub fn values(&self, key: &str) -> &[Value] {
        self.properties.values(key)
    }
}
