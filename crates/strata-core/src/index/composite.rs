//! Composite equality indexes.
//!
//! An index entry key is the concatenation of the registry frames of the
//! indexed keys' values, each prefixed with its length. Elements holding
//! several values under an indexed key (list or set cardinality) get one
//! entry per combination.

use parking_lot::RwLock;
use strata_common::types::{ElementId, ElementKind};
use strata_common::utils::error::Result;
use strata_common::utils::hash::{FxHashMap, FxHashSet};

use crate::graph::{ElementRecord, encode_values};
use crate::schema::CompositeIndexDef;
use crate::serializer::SerializerRegistry;

/// Builds an entry key from per-key frames, in index key order.
#[must_use]
pub fn composite_key<F: AsRef<[u8]>>(frames: &[F]) -> Vec<u8> {
    let len = frames.iter().map(|f| 4 + f.as_ref().len()).sum();
    let mut key = Vec::with_capacity(len);
    for frame in frames {
        let frame = frame.as_ref();
        key.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        key.extend_from_slice(frame);
    }
    key
}

struct IndexData {
    def: CompositeIndexDef,
    entries: FxHashMap<Vec<u8>, FxHashSet<ElementId>>,
}

impl IndexData {
    fn add(&mut self, keys: Vec<Vec<u8>>, id: ElementId) {
        for key in keys {
            self.entries.entry(key).or_default().insert(id);
        }
    }

    fn remove(&mut self, keys: Vec<Vec<u8>>, id: ElementId) {
        for key in keys {
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }
}

/// Entry keys `record` produces for `def`; empty if any indexed key is
/// unset or the element kind differs.
///
/// # Errors
///
/// Returns an error if a value cannot be encoded.
pub fn entry_keys(
    def: &CompositeIndexDef,
    record: &ElementRecord,
    registry: &SerializerRegistry,
) -> Result<Vec<Vec<u8>>> {
    if record.kind != def.element_kind {
        return Ok(Vec::new());
    }
    let mut combos: Vec<Vec<Vec<u8>>> = vec![Vec::new()];
    for key in &def.keys {
        let frames = encode_values(record.values(key), registry)?;
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                frames.iter().map(move |frame| {
                    let mut next = prefix.clone();
                    next.push(frame.clone());
                    next
                })
            })
            .collect();
    }
    let mut keys: Vec<Vec<u8>> = combos.iter().map(|c| composite_key(c)).collect();
    keys.sort_unstable();
    keys.dedup();
    Ok(keys)
}

struct EntryMove {
    index: String,
    id: ElementId,
    before: Vec<Vec<u8>>,
    after: Vec<Vec<u8>>,
}

/// Index entry changes planned with [`CompositeIndexStore::plan`].
///
/// Planning does all the encoding, so a commit can plan before it writes
/// and apply after without a way left to fail.
#[derive(Default)]
pub struct IndexDelta {
    moves: Vec<EntryMove>,
}

impl IndexDelta {
    /// Number of (index, element) pairs whose entries change.
    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Returns true if no entry changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// In-memory store for every composite index of one database.
#[derive(Default)]
pub struct CompositeIndexStore {
    indexes: RwLock<FxHashMap<String, IndexData>>,
}

impl CompositeIndexStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts maintaining `def`. Existing entries are kept if it is already
    /// registered.
    pub fn register(&self, def: CompositeIndexDef) {
        self.indexes
            .write()
            .entry(def.name.clone())
            .or_insert_with(|| IndexData {
                def,
                entries: FxHashMap::default(),
            });
    }

    /// Stops maintaining an index and drops its entries.
    pub fn unregister(&self, name: &str) -> bool {
        self.indexes.write().remove(name).is_some()
    }

    /// Returns true if the index is maintained.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.indexes.read().contains_key(name)
    }

    /// Number of maintained indexes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.read().len()
    }

    /// Returns true if no index is maintained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.read().is_empty()
    }

    /// Number of distinct entry keys in an index.
    #[must_use]
    pub fn entry_count(&self, name: &str) -> usize {
        self.indexes.read().get(name).map_or(0, |i| i.entries.len())
    }

    /// Adds `record` to the named index only.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be encoded.
    pub fn backfill(&self, name: &str, record: &ElementRecord, registry: &SerializerRegistry) -> Result<()> {
        let mut indexes = self.indexes.write();
        if let Some(index) = indexes.get_mut(name) {
            let keys = entry_keys(&index.def, record, registry)?;
            index.add(keys, record.id);
        }
        Ok(())
    }

    /// Moves an element's entries from its `old` to its `new` state in
    /// every index of its kind. Pass `None` for a created or deleted
    /// element.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be encoded. No index is touched
    /// in that case.
    pub fn update(
        &self,
        old: Option<&ElementRecord>,
        new: Option<&ElementRecord>,
        registry: &SerializerRegistry,
    ) -> Result<()> {
        let mut delta = IndexDelta::default();
        self.plan(&mut delta, old, new, registry)?;
        self.apply(delta);
        Ok(())
    }

    /// Adds to `delta` the entry moves that take an element from `old` to
    /// `new`, without touching any index.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be encoded. `delta` keeps only
    /// the moves planned before the failure.
    pub fn plan(
        &self,
        delta: &mut IndexDelta,
        old: Option<&ElementRecord>,
        new: Option<&ElementRecord>,
        registry: &SerializerRegistry,
    ) -> Result<()> {
        let Some(sample) = new.or(old) else {
            return Ok(());
        };
        let (id, kind) = (sample.id, sample.kind);

        let indexes = self.indexes.read();
        for (name, index) in indexes.iter().filter(|(_, i)| i.def.element_kind == kind) {
            let before = match old {
                Some(r) => entry_keys(&index.def, r, registry)?,
                None => Vec::new(),
            };
            let after = match new {
                Some(r) => entry_keys(&index.def, r, registry)?,
                None => Vec::new(),
            };
            if before != after {
                delta.moves.push(EntryMove {
                    index: name.clone(),
                    id,
                    before,
                    after,
                });
            }
        }
        Ok(())
    }

    /// Applies planned moves. Moves for an index dropped since planning
    /// are skipped.
    pub fn apply(&self, delta: IndexDelta) {
        if delta.moves.is_empty() {
            return;
        }
        let mut indexes = self.indexes.write();
        for entry in delta.moves {
            if let Some(index) = indexes.get_mut(&entry.index) {
                index.remove(entry.before, entry.id);
                index.add(entry.after, entry.id);
            }
        }
    }

    /// Elements whose indexed values equal `frames` (one frame per indexed
    /// key, in index order). `None` if the index is not maintained.
    #[must_use]
    pub fn lookup<F: AsRef<[u8]>>(&self, name: &str, frames: &[F]) -> Option<Vec<ElementId>> {
        let indexes = self.indexes.read();
        let index = indexes.get(name)?;
        let key = composite_key(frames);
        let mut ids: Vec<ElementId> = index
            .entries
            .get(&key)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        Some(ids)
    }

    /// Names of maintained indexes for `kind`.
    #[must_use]
    pub fn names_for(&self, kind: ElementKind) -> Vec<String> {
        self.indexes
            .read()
            .values()
            .filter(|i| i.def.element_kind == kind)
            .map(|i| i.def.name.clone())
            .collect()
    }

    /// Drops every index.
    pub fn clear(&self) {
        self.indexes.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::{Cardinality, Value};

    fn by_time() -> CompositeIndexDef {
        CompositeIndexDef {
            name: "byTime".into(),
            element_kind: ElementKind::Vertex,
            keys: vec!["time".into()],
        }
    }

    fn vertex(id: u64, time: i32) -> ElementRecord {
        let mut r = ElementRecord::vertex(ElementId::new(id), "v");
        r.properties.apply("time", Cardinality::Single, Value::Int32(time));
        r
    }

    fn frame(registry: &SerializerRegistry, v: i32) -> Vec<Vec<u8>> {
        vec![registry.encode(&Value::Int32(v)).unwrap()]
    }

    #[test]
    fn test_insert_update_delete() {
        let registry = SerializerRegistry::new();
        let store = CompositeIndexStore::new();
        store.register(by_time());

        let v1 = vertex(1, 5);
        store.update(None, Some(&v1), &registry).unwrap();
        assert_eq!(
            store.lookup("byTime", &frame(&registry, 5)),
            Some(vec![ElementId::new(1)])
        );

        let v1b = vertex(1, 6);
        store.update(Some(&v1), Some(&v1b), &registry).unwrap();
        assert_eq!(store.lookup("byTime", &frame(&registry, 5)), Some(vec![]));
        assert_eq!(
            store.lookup("byTime", &frame(&registry, 6)),
            Some(vec![ElementId::new(1)])
        );

        store.update(Some(&v1b), None, &registry).unwrap();
        assert_eq!(store.entry_count("byTime"), 0);
        assert!(store.lookup("missing", &frame(&registry, 5)).is_none());
    }

    #[test]
    fn test_multi_valued_and_missing_keys() {
        let registry = SerializerRegistry::new();
        let def = CompositeIndexDef {
            name: "byTimeAndTag".into(),
            element_kind: ElementKind::Vertex,
            keys: vec!["time".into(), "tag".into()],
        };

        let mut r = vertex(1, 5);
        assert!(entry_keys(&def, &r, &registry).unwrap().is_empty());

        r.properties.apply("tag", Cardinality::List, Value::from("a"));
        r.properties.apply("tag", Cardinality::List, Value::from("b"));
        r.properties.apply("tag", Cardinality::List, Value::from("a"));
        assert_eq!(entry_keys(&def, &r, &registry).unwrap().len(), 2);
    }

    #[test]
    fn test_planned_delta_touches_nothing_until_applied() {
        let registry = SerializerRegistry::new();
        let store = CompositeIndexStore::new();
        store.register(by_time());

        let v1 = vertex(1, 5);
        let v2 = vertex(2, 5);
        let mut delta = IndexDelta::default();
        store.plan(&mut delta, None, Some(&v1), &registry).unwrap();
        store.plan(&mut delta, None, Some(&v2), &registry).unwrap();
        assert_eq!(delta.len(), 2);
        assert_eq!(store.lookup("byTime", &frame(&registry, 5)), Some(vec![]));

        store.apply(delta);
        assert_eq!(
            store.lookup("byTime", &frame(&registry, 5)),
            Some(vec![ElementId::new(1), ElementId::new(2)])
        );
    }

    #[test]
    fn test_unencodable_value_fails_at_plan() {
        #[derive(Debug, Clone, PartialEq)]
        struct Unregistered;

        let registry = SerializerRegistry::new();
        let store = CompositeIndexStore::new();
        store.register(by_time());

        let mut bad = ElementRecord::vertex(ElementId::new(3), "v");
        bad.properties.apply("time", Cardinality::Single, Value::custom(Unregistered));
        let mut delta = IndexDelta::default();
        store.plan(&mut delta, None, Some(&vertex(1, 5)), &registry).unwrap();
        assert!(store.plan(&mut delta, None, Some(&bad), &registry).is_err());
        assert_eq!(store.entry_count("byTime"), 0);
    }

    #[test]
    fn test_kind_filter() {
        let registry = SerializerRegistry::new();
        let store = CompositeIndexStore::new();
        store.register(by_time());
        let mut edge = ElementRecord::edge(ElementId::new(7), "e", ElementId::new(1), ElementId::new(2));
        edge.properties.apply("time", Cardinality::Single, Value::Int32(5));
        store.update(None, Some(&edge), &registry).unwrap();
        assert_eq!(store.lookup("byTime", &frame(&registry, 5)), Some(vec![]));
    }

    #[test]
    fn test_backfill_targets_one_index() {
        let registry = SerializerRegistry::new();
        let store = CompositeIndexStore::new();
        store.register(by_time());
        store.backfill("byTime", &vertex(4, 1), &registry).unwrap();
        store.backfill("unknown", &vertex(5, 1), &registry).unwrap();
        assert_eq!(
            store.lookup("byTime", &frame(&registry, 1)),
            Some(vec![ElementId::new(4)])
        );
        assert_eq!(store.names_for(ElementKind::Vertex), vec!["byTime".to_string()]);

        assert!(store.unregister("byTime"));
        assert!(!store.unregister("byTime"));
        assert!(store.is_empty());
    }
}
