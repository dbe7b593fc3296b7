//! Serializers for the builtin value variants.
//!
//! These are registered by every [`SerializerRegistry`](super::SerializerRegistry)
//! at construction and occupy the reserved ids `1..=7`.

use std::any::TypeId;

use strata_common::types::{AttributeType, SerializerId, Value};
use strata_common::utils::error::{Result, SerializerError};

use super::buffer::{ReadBuffer, WriteBuffer};
use super::registry::ErasedSerializer;

/// One of the builtin value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Bytes,
}

impl Builtin {
    pub(crate) const ALL: [Builtin; 7] = [
        Builtin::Bool,
        Builtin::Int32,
        Builtin::Int64,
        Builtin::Float32,
        Builtin::Float64,
        Builtin::String,
        Builtin::Bytes,
    ];

    pub(crate) fn id(self) -> SerializerId {
        SerializerId::new(match self {
            Builtin::Bool => 1,
            Builtin::Int32 => 2,
            Builtin::Int64 => 3,
            Builtin::Float32 => 4,
            Builtin::Float64 => 5,
            Builtin::String => 6,
            Builtin::Bytes => 7,
        })
    }

    pub(crate) fn attribute_type(self) -> AttributeType {
        match self {
            Builtin::Bool => AttributeType::of::<bool>(),
            Builtin::Int32 => AttributeType::of::<i32>(),
            Builtin::Int64 => AttributeType::of::<i64>(),
            Builtin::Float32 => AttributeType::of::<f32>(),
            Builtin::Float64 => AttributeType::of::<f64>(),
            Builtin::String => AttributeType::of::<String>(),
            Builtin::Bytes => AttributeType::of::<Vec<u8>>(),
        }
    }

    fn mismatch(self, value: &Value) -> strata_common::Error {
        SerializerError::TypeMismatch {
            expected: self.attribute_type().name(),
            found: value.attribute_type().name(),
        }
        .into()
    }
}

impl ErasedSerializer for Builtin {
    fn serializer_type(&self) -> TypeId {
        TypeId::of::<Builtin>()
    }

    fn serializer_name(&self) -> &'static str {
        "builtin"
    }

    fn write_value(&self, buffer: &mut WriteBuffer, value: &Value) -> Result<()> {
        match (self, value) {
            (Builtin::Bool, Value::Bool(v)) => buffer.put_bool(*v),
            (Builtin::Int32, Value::Int32(v)) => buffer.put_i32(*v),
            (Builtin::Int64, Value::Int64(v)) => buffer.put_i64(*v),
            (Builtin::Float32, Value::Float32(v)) => buffer.put_f32(*v),
            (Builtin::Float64, Value::Float64(v)) => buffer.put_f64(*v),
            (Builtin::String, Value::String(s)) => buffer.put_str(s),
            (Builtin::Bytes, Value::Bytes(b)) => buffer.put_bytes(b),
            _ => return Err(self.mismatch(value)),
        }
        Ok(())
    }

    fn read_value(&self, buffer: &mut ReadBuffer<'_>) -> Result<Value> {
        Ok(match self {
            Builtin::Bool => Value::Bool(buffer.get_bool()?),
            Builtin::Int32 => Value::Int32(buffer.get_i32()?),
            Builtin::Int64 => Value::Int64(buffer.get_i64()?),
            Builtin::Float32 => Value::Float32(buffer.get_f32()?),
            Builtin::Float64 => Value::Float64(buffer.get_f64()?),
            Builtin::String => Value::from(buffer.get_string()?),
            Builtin::Bytes => Value::from(buffer.get_bytes()?),
        })
    }
}
