//! Element state: records, property maps and their stored form.
//!
//! ## Modules
//!
//! - [`element`] - Committed vertex and edge records
//! - [`property`] - Cardinality-aware property maps
//! - [`codec`] - Snapshot encoding through the serializer registry

pub mod codec;
pub mod element;
pub mod property;

pub use codec::{decode_element, encode_element, encode_values};
pub use element::ElementRecord;
pub use property::{PropertyMap, PropertyValues};
