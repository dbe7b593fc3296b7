//! Backend key layout.
//!
//! | Prefix | Content |
//! |--------|---------|
//! | `E` + id (u64, big-endian) | element snapshot |
//! | `S` + `schema` | schema record |

use strata_common::types::ElementId;

/// Prefix of every element key.
pub const ELEMENT_PREFIX: &[u8] = b"E";

/// Key of the schema record.
pub const SCHEMA_KEY: &[u8] = b"Sschema";

/// Key of an element snapshot.
#[must_use]
pub fn element_key(id: ElementId) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.extend_from_slice(ELEMENT_PREFIX);
    key.extend_from_slice(&id.as_u64().to_be_bytes());
    key
}

/// Parses an element key, `None` for any other key.
#[must_use]
pub fn parse_element_key(key: &[u8]) -> Option<ElementId> {
    let rest = key.strip_prefix(ELEMENT_PREFIX)?;
    let bytes: [u8; 8] = rest.try_into().ok()?;
    Some(ElementId::new(u64::from_be_bytes(bytes)))
}

/// Printable form for error messages.
#[must_use]
pub fn describe(key: &[u8]) -> String {
    if let Some(id) = parse_element_key(key) {
        return format!("element {id}");
    }
    if key == SCHEMA_KEY {
        return "schema".to_string();
    }
    String::from_utf8_lossy(key).into_owned()
}
