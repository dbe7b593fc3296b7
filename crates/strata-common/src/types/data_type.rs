//! Schema vocabulary: data types, cardinalities, element kinds.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::{AttributeType, Value};

/// How many values a property key holds per element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// One value; writing again replaces it.
    #[default]
    Single,
    /// Ordered values, duplicates allowed.
    List,
    /// Unique values under value equality, in insertion order.
    Set,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cardinality::Single => "SINGLE",
            Cardinality::List => "LIST",
            Cardinality::Set => "SET",
        })
    }
}

/// Vertex or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// A vertex.
    Vertex,
    /// An edge between two vertices.
    Edge,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
        })
    }
}

/// The declared data type of a property key.
///
/// A value is accepted by a key only if its exact runtime type matches the
/// declared type. [`DataType::Any`] accepts every value, but the value must
/// still have a registered serializer to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Any registered type.
    Any,
    /// `bool`
    Bool,
    /// `i32`
    Int32,
    /// `i64`
    Int64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// `String`
    String,
    /// `Vec<u8>`
    Bytes,
    /// An application type.
    Custom(AttributeType),
}

impl DataType {
    /// The data type for Rust type `T`.
    ///
    /// Builtin types map to their dedicated variant.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        let ty = AttributeType::of::<T>();
        Self::from_attribute_type(ty)
    }

    /// Maps an attribute type to the matching data type.
    #[must_use]
    pub fn from_attribute_type(ty: AttributeType) -> Self {
        if ty == AttributeType::of::<bool>() {
            DataType::Bool
        } else if ty == AttributeType::of::<i32>() {
            DataType::Int32
        } else if ty == AttributeType::of::<i64>() {
            DataType::Int64
        } else if ty == AttributeType::of::<f32>() {
            DataType::Float32
        } else if ty == AttributeType::of::<f64>() {
            DataType::Float64
        } else if ty == AttributeType::of::<String>() {
            DataType::String
        } else if ty == AttributeType::of::<Vec<u8>>() {
            DataType::Bytes
        } else {
            DataType::Custom(ty)
        }
    }

    /// The exact attribute type this data type admits, or `None` for `Any`.
    #[must_use]
    pub fn attribute_type(&self) -> Option<AttributeType> {
        match self {
            DataType::Any => None,
            DataType::Bool => Some(AttributeType::of::<bool>()),
            DataType::Int32 => Some(AttributeType::of::<i32>()),
            DataType::Int64 => Some(AttributeType::of::<i64>()),
            DataType::Float32 => Some(AttributeType::of::<f32>()),
            DataType::Float64 => Some(AttributeType::of::<f64>()),
            DataType::String => Some(AttributeType::of::<String>()),
            DataType::Bytes => Some(AttributeType::of::<Vec<u8>>()),
            DataType::Custom(ty) => Some(*ty),
        }
    }

    /// Returns true if `value` may be stored under a key of this type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self.attribute_type() {
            None => true,
            Some(ty) => value.attribute_type() == ty,
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Any => "ANY",
            DataType::Bool => "BOOL",
            DataType::Int32 => "INT32",
            DataType::Int64 => "INT64",
            DataType::Float32 => "FLOAT32",
            DataType::Float64 => "FLOAT64",
            DataType::String => "STRING",
            DataType::Bytes => "BYTES",
            DataType::Custom(ty) => ty.short_name(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
