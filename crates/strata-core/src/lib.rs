//! # strata-core
//!
//! Core data structures for Strata: the serializer registry, schema
//! definitions, element records and composite indexes.
//!
//! ## Modules
//!
//! - [`serializer`] - Closed-world attribute serialization
//! - [`schema`] - Property keys, labels, indexes and committed snapshots
//! - [`graph`] - Element records, property maps and their stored form
//! - [`index`] - Composite equality indexes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod graph;
pub mod index;
pub mod schema;
pub mod serializer;

pub use graph::{ElementRecord, PropertyMap};
pub use index::{CompositeIndexStore, IndexDelta};
pub use schema::{CompositeIndexDef, PropertyKeyDef, SchemaChanges, SchemaRecord, SchemaSnapshot};
pub use serializer::{AttributeSerializer, ReadBuffer, SerializerRegistry, WriteBuffer};
