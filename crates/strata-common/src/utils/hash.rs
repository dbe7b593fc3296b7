//! Fast hash map and set aliases.
//!
//! Keys in this codebase are never attacker-controlled, so the maps use
//! `ahash` instead of SipHash.

/// Hash map keyed with `ahash`.
pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// Hash set keyed with `ahash`.
pub type FxHashSet<T> = hashbrown::HashSet<T, ahash::RandomState>;
