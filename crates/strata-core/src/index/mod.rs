//! Secondary indexes over committed elements.
//!
//! - [`composite`] - Equality lookup on one or more property keys

pub mod composite;

pub use composite::{CompositeIndexStore, IndexDelta, composite_key, entry_keys};
