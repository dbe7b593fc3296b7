//! Integration tests for the permanent cache and commit concurrency.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use strata::{
    Cardinality, Config, DataType, DurabilityMode, ElementId, ElementKind, InMemoryBackend,
    RetryPolicy, StorageBackend, StorageError, StoredEntry, StrataDB, SerializerRegistry,
    WriteBatch,
};

fn declare_counter(db: &StrataDB) -> Result<()> {
    let mut mgmt = db.open_management()?;
    mgmt.make_property_key("name").data_type(DataType::String).make()?;
    mgmt.make_property_key("count").data_type(DataType::Int64).make()?;
    mgmt.make_property_key("history")
        .data_type(DataType::Int64)
        .cardinality(Cardinality::List)
        .make()?;
    mgmt.make_vertex_label("counter").make()?;
    mgmt.build_index("byName", ElementKind::Vertex)
        .add_key("name")
        .build_composite_index()?;
    mgmt.commit()?;
    Ok(())
}

fn create_counter(db: &StrataDB, name: &str) -> Result<ElementId> {
    let mut tx = db.new_transaction()?;
    let v = tx.add_vertex("counter")?;
    tx.property(v, "name", name)?;
    tx.property(v, "count", 0_i64)?;
    let summary = tx.commit()?;
    Ok(summary.id_of(v).expect("new vertex gets an id"))
}

fn read_count(db: &StrataDB, id: ElementId) -> Result<i64> {
    let mut tx = db.new_transaction()?;
    let v = tx.vertex(id)?.expect("counter exists");
    let count = tx.value(v, "count")?.and_then(|v| v.as_int64());
    tx.rollback()?;
    Ok(count.unwrap_or_default())
}

#[test]
fn test_loads_hit_cache_after_commit() -> Result<()> {
    let db = StrataDB::new_in_memory();
    declare_counter(&db)?;
    let id = create_counter(&db, "a")?;

    // The commit refreshed the entry, so the next load is a hit.
    let before = db.cache_stats();
    assert_eq!(read_count(&db, id)?, 0);
    let after = db.cache_stats();
    assert_eq!(after.hits, before.hits + 1);
    assert_eq!(after.misses, before.misses);
    Ok(())
}

#[test]
fn test_disabled_cache_reads_backend() -> Result<()> {
    let db = StrataDB::with_config(Config::in_memory().without_cache())?;
    declare_counter(&db)?;
    let id = create_counter(&db, "a")?;

    assert_eq!(read_count(&db, id)?, 0);
    assert_eq!(read_count(&db, id)?, 0);
    let stats = db.cache_stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.entries, 0);
    Ok(())
}

#[test]
fn test_expired_entries_are_reloaded() -> Result<()> {
    let db = StrataDB::with_config(Config::in_memory().with_cache_ttl(Duration::from_millis(1)))?;
    declare_counter(&db)?;
    let id = create_counter(&db, "a")?;

    thread::sleep(Duration::from_millis(10));
    let before = db.cache_stats();
    assert_eq!(read_count(&db, id)?, 0);
    assert_eq!(db.cache_stats().misses, before.misses + 1);
    Ok(())
}

#[test]
fn test_committed_update_never_served_stale() -> Result<()> {
    let db = StrataDB::new_in_memory();
    declare_counter(&db)?;
    let id = create_counter(&db, "a")?;
    assert_eq!(read_count(&db, id)?, 0);

    let mut tx = db.new_transaction()?;
    let v = tx.vertex(id)?.expect("counter exists");
    tx.property(v, "count", 41_i64)?;
    tx.commit()?;

    assert_eq!(read_count(&db, id)?, 41);

    let mut tx = db.new_transaction()?;
    let v = tx.vertex(id)?.expect("counter exists");
    tx.remove(v)?;
    tx.commit()?;

    let mut tx = db.new_transaction()?;
    assert!(tx.vertex(id)?.is_none());
    assert!(tx.query().has("name", "a").vertices()?.is_empty());
    Ok(())
}

#[test]
fn test_stale_writer_loses() -> Result<()> {
    let db = StrataDB::new_in_memory();
    declare_counter(&db)?;
    let id = create_counter(&db, "a")?;

    let mut first = db.new_transaction()?;
    let mut second = db.new_transaction()?;
    let a = first.vertex(id)?.expect("counter exists");
    let b = second.vertex(id)?.expect("counter exists");

    second.property(b, "count", 2_i64)?;
    second.commit()?;

    first.property(a, "count", 1_i64)?;
    let err = first.commit().unwrap_err();
    assert!(err.is_concurrency_conflict());
    assert!(!first.is_open());

    assert_eq!(read_count(&db, id)?, 2);
    Ok(())
}

#[test]
fn test_concurrent_increments_with_retry() -> Result<()> {
    const THREADS: i64 = 4;
    const INCREMENTS: i64 = 25;

    let db = StrataDB::new_in_memory();
    declare_counter(&db)?;
    let id = create_counter(&db, "shared")?;
    let conflicts = AtomicU32::new(0);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..INCREMENTS {
                    loop {
                        let attempt = || -> strata::Result<()> {
                            let mut tx = db.new_transaction()?;
                            let v = tx.vertex(id)?.expect("counter exists");
                            let count = tx.value(v, "count")?.and_then(|v| v.as_int64());
                            let next = count.unwrap_or_default() + 1;
                            tx.property(v, "count", next)?;
                            tx.property(v, "history", next)?;
                            tx.commit().map(|_| ())
                        };
                        // Loads conflict too once another increment lands.
                        match attempt() {
                            Ok(()) => break,
                            Err(e) if e.is_concurrency_conflict() => {
                                conflicts.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => panic!("unexpected increment failure: {e}"),
                        }
                    }
                }
            });
        }
    });

    assert_eq!(read_count(&db, id)?, THREADS * INCREMENTS);

    // Every successful increment appended exactly once, in order.
    let mut tx = db.new_transaction()?;
    let v = tx.vertex(id)?.expect("counter exists");
    let history: Vec<i64> = tx
        .values(v, "history")?
        .iter()
        .filter_map(|value| value.as_int64())
        .collect();
    let expected: Vec<i64> = (1..=THREADS * INCREMENTS).collect();
    assert_eq!(history, expected);
    Ok(())
}

#[test]
fn test_connections_do_not_share_cache() -> Result<()> {
    let left = StrataDB::new_in_memory();
    let right = StrataDB::new_in_memory();
    assert_ne!(left.backend_id(), right.backend_id());

    declare_counter(&left)?;
    declare_counter(&right)?;
    let id = create_counter(&left, "only-left")?;

    let mut tx = right.new_transaction()?;
    assert!(tx.vertex(id)?.is_none());
    assert!(tx.query().has("name", "only-left").vertices()?.is_empty());
    Ok(())
}

#[test]
fn test_persistent_reopen_rebuilds_indexes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = Config::persistent(dir.path()).with_durability(DurabilityMode::NoSync);

    let id = {
        let db = StrataDB::with_config(config.clone())?;
        declare_counter(&db)?;
        let id = create_counter(&db, "durable")?;
        let mut tx = db.new_transaction()?;
        let v = tx.vertex(id)?.expect("counter exists");
        tx.property(v, "count", 7_i64)?;
        tx.commit()?;
        db.close()?;
        id
    };

    let db = StrataDB::with_config(config)?;
    assert!(db.schema().index("byName").is_some());
    assert_eq!(read_count(&db, id)?, 7);

    let mut tx = db.new_transaction()?;
    let found = tx.query().has("name", "durable").vertices()?;
    assert_eq!(found.len(), 1);
    assert_eq!(tx.id(found[0])?, Some(id));
    Ok(())
}

/// Fails the next `failures` backend calls with `Unavailable`.
struct Flaky {
    inner: InMemoryBackend,
    failures: AtomicU32,
}

impl Flaky {
    fn new() -> Self {
        Self {
            inner: InMemoryBackend::new(),
            failures: AtomicU32::new(0),
        }
    }

    fn trip(&self) -> strata::Result<()> {
        let tripped = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(StorageError::Unavailable("connection reset".into()).into());
        }
        Ok(())
    }
}

impl StorageBackend for Flaky {
    fn id(&self) -> &str {
        self.inner.id()
    }
    fn read(&self, key: &[u8]) -> strata::Result<Option<StoredEntry>> {
        self.trip()?;
        self.inner.read(key)
    }
    fn scan_prefix(&self, prefix: &[u8]) -> strata::Result<Vec<(Vec<u8>, StoredEntry)>> {
        self.trip()?;
        self.inner.scan_prefix(prefix)
    }
    fn write_batch(&self, batch: &WriteBatch) -> strata::Result<()> {
        self.trip()?;
        self.inner.write_batch(batch)
    }
    fn close(&self) -> strata::Result<()> {
        self.inner.close()
    }
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
    }
}

#[test]
fn test_transient_failures_are_retried() -> Result<()> {
    // Keep a handle on the failure counter through a shared backend.
    struct Shared(std::sync::Arc<Flaky>);

    impl StorageBackend for Shared {
        fn id(&self) -> &str {
            self.0.id()
        }
        fn read(&self, key: &[u8]) -> strata::Result<Option<StoredEntry>> {
            self.0.read(key)
        }
        fn scan_prefix(&self, prefix: &[u8]) -> strata::Result<Vec<(Vec<u8>, StoredEntry)>> {
            self.0.scan_prefix(prefix)
        }
        fn write_batch(&self, batch: &WriteBatch) -> strata::Result<()> {
            self.0.write_batch(batch)
        }
        fn close(&self) -> strata::Result<()> {
            self.0.close()
        }
        fn is_open(&self) -> bool {
            self.0.is_open()
        }
    }

    let flaky = std::sync::Arc::new(Flaky::new());
    let config = Config::in_memory().without_cache().with_retry(fast_retry(3));
    let db = StrataDB::with_backend(
        Shared(std::sync::Arc::clone(&flaky)),
        config,
        SerializerRegistry::new(),
    )?;
    declare_counter(&db)?;

    // Within budget: two failures, third attempt succeeds.
    flaky.failures.store(2, Ordering::SeqCst);
    let id = create_counter(&db, "a")?;
    flaky.failures.store(2, Ordering::SeqCst);
    assert_eq!(read_count(&db, id)?, 0);

    // Out of budget: the commit surfaces the failure and rolls back.
    let mut tx = db.new_transaction()?;
    let v = tx.add_vertex("counter")?;
    tx.property(v, "name", "b")?;
    flaky.failures.store(10, Ordering::SeqCst);
    let err = tx.commit().unwrap_err();
    assert!(err.is_backend_unavailable());
    assert!(!tx.is_open());

    flaky.failures.store(0, Ordering::SeqCst);
    let mut tx = db.new_transaction()?;
    assert!(tx.query().has("name", "b").vertices()?.is_empty());
    Ok(())
}
