//! Schema definitions shared by the management and data paths.
//!
//! ## Modules
//!
//! - [`definition`] - Property keys, composite indexes, staged changes
//! - [`snapshot`] - Immutable committed schema
//! - [`record`] - Persisted schema record

pub mod definition;
pub mod record;
pub mod snapshot;

pub use definition::{CompositeIndexDef, PropertyKeyDef, SchemaChanges};
pub use record::SchemaRecord;
pub use snapshot::SchemaSnapshot;
