//! # strata-common
//!
//! Foundation layer for Strata: identifiers, the property value model, and
//! the error taxonomy shared by every other crate.
//!
//! ## Modules
//!
//! - [`types`] - Identifiers ([`ElementId`], [`TxId`], [`EpochId`]), the
//!   [`Value`] model, [`DataType`] and [`Cardinality`]
//! - [`utils`] - Hashing aliases and the [`Error`] type

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use types::{
    Attribute, AttributeType, Cardinality, CustomValue, DataType, ElementId, ElementKind, EpochId,
    SerializerId, TxId, Value,
};
pub use utils::error::{Error, Result};
