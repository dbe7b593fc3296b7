//! Core type definitions for Strata.
//!
//! - Identifier types ([`ElementId`], [`TxId`], [`EpochId`], [`SerializerId`])
//! - Property values ([`Value`], [`Attribute`], [`AttributeType`])
//! - Schema vocabulary ([`DataType`], [`Cardinality`], [`ElementKind`])

mod data_type;
mod id;
mod value;

pub use data_type::{Cardinality, DataType, ElementKind};
pub use id::{ElementId, EpochId, SerializerId, TxId};
pub use value::{Attribute, AttributeType, CustomValue, Value};
