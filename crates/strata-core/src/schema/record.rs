//! Persisted form of the schema.
//!
//! Custom data types are stored by serializer id, so a schema can only be
//! loaded by a registry that binds the same ids.

use serde::{Deserialize, Serialize};
use strata_common::types::{Cardinality, DataType, ElementKind, EpochId, SerializerId};
use strata_common::utils::error::{Error, Result, SerializerError};

use super::definition::{CompositeIndexDef, PropertyKeyDef};
use super::snapshot::SchemaSnapshot;
use crate::serializer::SerializerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum DataTypeCode {
    Any,
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
    Custom(SerializerId),
}

impl DataTypeCode {
    fn encode(data_type: DataType, registry: &SerializerRegistry) -> Result<Self> {
        Ok(match data_type {
            DataType::Any => DataTypeCode::Any,
            DataType::Bool => DataTypeCode::Bool,
            DataType::Int32 => DataTypeCode::Int32,
            DataType::Int64 => DataTypeCode::Int64,
            DataType::Float32 => DataTypeCode::Float32,
            DataType::Float64 => DataTypeCode::Float64,
            DataType::String => DataTypeCode::String,
            DataType::Bytes => DataTypeCode::Bytes,
            DataType::Custom(ty) => DataTypeCode::Custom(registry.validate_type(ty)?),
        })
    }

    fn decode(self, registry: &SerializerRegistry) -> Result<DataType> {
        Ok(match self {
            DataTypeCode::Any => DataType::Any,
            DataTypeCode::Bool => DataType::Bool,
            DataTypeCode::Int32 => DataType::Int32,
            DataTypeCode::Int64 => DataType::Int64,
            DataTypeCode::Float32 => DataType::Float32,
            DataTypeCode::Float64 => DataType::Float64,
            DataTypeCode::String => DataType::String,
            DataTypeCode::Bytes => DataType::Bytes,
            DataTypeCode::Custom(id) => {
                let ty = registry
                    .attribute_type(id)
                    .ok_or(SerializerError::UnknownSerializerId(id.as_u16()))?;
                DataType::Custom(ty)
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PropertyKeyRecord {
    name: String,
    data_type: DataTypeCode,
    cardinality: Cardinality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRecord {
    name: String,
    element_kind: ElementKind,
    keys: Vec<String>,
}

/// Serializable schema, stored under the reserved schema key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRecord {
    property_keys: Vec<PropertyKeyRecord>,
    vertex_labels: Vec<String>,
    edge_labels: Vec<String>,
    indexes: Vec<IndexRecord>,
}

impl SchemaRecord {
    /// Captures a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::UnregisteredType`] if a custom data type
    /// lost its registration.
    pub fn from_snapshot(snapshot: &SchemaSnapshot, registry: &SerializerRegistry) -> Result<Self> {
        let property_keys = snapshot
            .property_keys()
            .map(|k| {
                Ok(PropertyKeyRecord {
                    name: k.name.clone(),
                    data_type: DataTypeCode::encode(k.data_type, registry)?,
                    cardinality: k.cardinality,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            property_keys,
            vertex_labels: snapshot.vertex_labels().map(str::to_string).collect(),
            edge_labels: snapshot.edge_labels().map(str::to_string).collect(),
            indexes: snapshot
                .indexes()
                .map(|i| IndexRecord {
                    name: i.name.clone(),
                    element_kind: i.element_kind,
                    keys: i.keys.clone(),
                })
                .collect(),
        })
    }

    /// Rebuilds the snapshot, stamping it with the stored `version`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializerError::UnknownSerializerId`] if a custom data
    /// type refers to an id the registry does not bind.
    pub fn into_snapshot(self, version: EpochId, registry: &SerializerRegistry) -> Result<SchemaSnapshot> {
        let property_keys = self
            .property_keys
            .into_iter()
            .map(|k| {
                Ok(PropertyKeyDef {
                    name: k.name,
                    data_type: k.data_type.decode(registry)?,
                    cardinality: k.cardinality,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let indexes = self
            .indexes
            .into_iter()
            .map(|i| CompositeIndexDef {
                name: i.name,
                element_kind: i.element_kind,
                keys: i.keys,
            })
            .collect();
        Ok(SchemaSnapshot::from_parts(
            Some(version),
            property_keys,
            self.vertex_labels,
            self.edge_labels,
            indexes,
        ))
    }

    /// Encodes the record with bincode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] on encoder failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decodes a record written by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the bytes are not a schema record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (record, _): (Self, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(record)
    }
}
