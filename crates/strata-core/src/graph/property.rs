//! Per-element property storage.
//!
//! Each element keeps its properties in a [`PropertyMap`]: key name to the
//! ordered values held under that key. How a write combines with what is
//! already there depends on the key's [`Cardinality`].

use indexmap::IndexMap;
use smallvec::SmallVec;
use strata_common::types::{Cardinality, Value};

/// Values held under one key. Most keys are single-valued.
pub type PropertyValues = SmallVec<[Value; 1]>;

/// Properties of one element, in first-write order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: IndexMap<String, PropertyValues>,
}

impl PropertyMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` under `key`.
    ///
    /// - `Single` replaces whatever was stored.
    /// - `List` appends, keeping duplicates.
    /// - `Set` appends unless an equal value is already present.
    ///
    /// Returns false if the write was a no-op (a `Set` duplicate).
    pub fn apply(&mut self, key: &str, cardinality: Cardinality, value: Value) -> bool {
        let values = self.entries.entry(key.to_string()).or_default();
        match cardinality {
            Cardinality::Single => {
                values.clear();
                values.push(value);
            }
            Cardinality::List => values.push(value),
            Cardinality::Set => {
                if values.contains(&value) {
                    return false;
                }
                values.push(value);
            }
        }
        true
    }

    /// Stores `values` under `key` as-is, replacing what was there.
    pub fn insert_all(&mut self, key: String, values: PropertyValues) {
        if values.is_empty() {
            self.entries.shift_remove(&key);
        } else {
            self.entries.insert(key, values);
        }
    }

    /// First value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).and_then(|v| v.first())
    }

    /// All values under `key`, empty if unset.
    #[must_use]
    pub fn values(&self, key: &str) -> &[Value] {
        self.entries.get(key).map_or(&[][..], |v| v.as_slice())
    }

    /// Removes every value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<PropertyValues> {
        self.entries.shift_remove(key)
    }

    /// Returns true if `key` holds at least one value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys with at least one value.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates `(key, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of keys with values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
