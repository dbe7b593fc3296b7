//! Element snapshot encoding.
//!
//! A snapshot is a bincode-encoded [`StoredElement`] whose property values
//! are registry frames (`[serializer id][payload]`). Decoding therefore
//! needs the same registry that encoded it.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strata_common::types::{ElementId, ElementKind, Value};
use strata_common::utils::error::{Error, Result};

use super::element::ElementRecord;
use super::property::{PropertyMap, PropertyValues};
use crate::serializer::SerializerRegistry;

#[derive(Debug, Serialize, Deserialize)]
struct StoredElement {
    id: ElementId,
    kind: ElementKind,
    label: String,
    endpoints: Option<(ElementId, ElementId)>,
    properties: Vec<(String, Vec<Vec<u8>>)>,
}

/// Encodes `record` for storage.
///
/// # Errors
///
/// Returns an error if a value's type is not registered or bincode fails.
pub fn encode_element(record: &ElementRecord, registry: &SerializerRegistry) -> Result<Vec<u8>> {
    let properties = record
        .properties
        .iter()
        .map(|(key, values)| {
            let frames = values
                .iter()
                .map(|v| registry.encode(v))
                .collect::<Result<Vec<_>>>()?;
            Ok((key.to_string(), frames))
        })
        .collect::<Result<Vec<_>>>()?;
    let stored = StoredElement {
        id: record.id,
        kind: record.kind,
        label: record.label.clone(),
        endpoints: record.endpoints,
        properties,
    };
    bincode::serde::encode_to_vec(&stored, bincode::config::standard())
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Decodes a snapshot written by [`encode_element`].
///
/// # Errors
///
/// Returns an error if the bytes are not a snapshot or a value cannot be
/// read by its serializer.
pub fn decode_element(bytes: &[u8], registry: &SerializerRegistry) -> Result<ElementRecord> {
    let (stored, _): (StoredElement, _) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))?;
    let mut properties = PropertyMap::new();
    for (key, frames) in stored.properties {
        let values = frames
            .iter()
            .map(|f| registry.decode(f))
            .collect::<Result<PropertyValues>>()?;
        properties.insert_all(key, values);
    }
    Ok(ElementRecord {
        id: stored.id,
        kind: stored.kind,
        label: stored.label,
        endpoints: stored.endpoints,
        properties,
    })
}

/// Frames `values` of one key, used for byte-level comparison.
///
/// # Errors
///
/// Returns an error if a value's type is not registered.
pub fn encode_values(
    values: &[Value],
    registry: &SerializerRegistry,
) -> Result<SmallVec<[Vec<u8>; 1]>> {
    values.iter().map(|v| registry.encode(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::Cardinality;

    #[test]
    fn test_vertex_snapshot() {
        let registry = SerializerRegistry::new();
        let mut record = ElementRecord::vertex(ElementId::new(9), "person");
        record
            .properties
            .apply("name", Cardinality::Single, Value::from("ada"));
        record
            .properties
            .apply("scores", Cardinality::List, Value::Int64(3));
        record
            .properties
            .apply("scores", Cardinality::List, Value::Float64(2.5));

        let bytes = encode_element(&record, &registry).unwrap();
        let decoded = decode_element(&bytes, &registry).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_edge_endpoints_survive() {
        let registry = SerializerRegistry::new();
        let record = ElementRecord::edge(ElementId::new(3), "knows", ElementId::new(1), ElementId::new(2));
        let decoded = decode_element(&encode_element(&record, &registry).unwrap(), &registry).unwrap();
        assert_eq!(decoded.endpoints, Some((ElementId::new(1), ElementId::new(2))));
        assert_eq!(decoded.kind, ElementKind::Edge);
    }

    #[test]
    fn test_unregistered_value_fails_encode() {
        #[derive(Debug, PartialEq)]
        struct Opaque;

        let registry = SerializerRegistry::new();
        let mut record = ElementRecord::vertex(ElementId::new(1), "v");
        record
            .properties
            .apply("x", Cardinality::Single, Value::custom(Opaque));
        assert!(encode_element(&record, &registry).unwrap_err().is_unregistered_type());
    }

    #[test]
    fn test_garbage_fails_decode() {
        let registry = SerializerRegistry::new();
        assert!(decode_element(&[0xFF, 0xFF, 0xFF], &registry).is_err());
    }
}
