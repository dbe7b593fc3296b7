//! Attribute serialization.
//!
//! The [`SerializerRegistry`] binds exact value types to
//! [`AttributeSerializer`] implementations. Nothing reaches storage without
//! passing through it.
//!
//! ## Modules
//!
//! - [`buffer`] - Byte buffers handed to serializers
//! - [`registry`] - Registration, validation and value encoding

pub mod buffer;
mod builtin;
pub mod registry;

pub use buffer::{ReadBuffer, WriteBuffer};
pub use registry::{
    AttributeRegistration, AttributeSerializer, CUSTOM_SERIALIZER_BASE, EncodedValue,
    SerializerRegistry,
};
