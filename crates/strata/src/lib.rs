//! # Strata
//!
//! Type-safe property persistence for graph databases.
//!
//! Start with [`StrataDB`]. Every value written to a property must have a
//! serializer registered for its exact type in a [`SerializerRegistry`];
//! property keys, labels and composite indexes are declared through a
//! [`ManagementTransaction`]; vertices, edges and properties are written in
//! a [`Transaction`] that commits atomically through a per-connection
//! permanent cache.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::{Cardinality, DataType, ElementKind, StrataDB, Value};
//!
//! let db = StrataDB::new_in_memory();
//!
//! // Declare the schema
//! let mut mgmt = db.open_management()?;
//! mgmt.make_property_key("time").data_type(DataType::Int32).make()?;
//! mgmt.make_property_key("any").cardinality(Cardinality::List).make()?;
//! mgmt.make_vertex_label("event").make()?;
//! mgmt.build_index("byTime", ElementKind::Vertex).add_key("time").build_composite_index()?;
//! mgmt.commit()?;
//!
//! // Write
//! let mut tx = db.new_transaction()?;
//! let v = tx.add_vertex("event")?;
//! tx.property(v, "time", 5)?;
//! tx.property(v, "any", 5.0)?;
//! tx.property(v, "any", "five")?;
//! tx.commit()?;
//!
//! // Read back through the index
//! let mut tx = db.new_transaction()?;
//! let found = tx.query().has("time", 5).vertices()?;
//! assert_eq!(tx.values(found[0], "any")?, &[Value::Float64(5.0), Value::from("five")]);
//! # Ok::<(), strata::Error>(())
//! ```

// Re-export the main database API
pub use strata_engine::{
    CommitSummary, Config, ElementRef, GraphQuery, ManagementTransaction, QueryPlan, StrataDB,
    Transaction, TxState,
};

// Serializer registry and schema types
pub use strata_core::{
    AttributeSerializer, CompositeIndexDef, PropertyKeyDef, ReadBuffer, SchemaSnapshot,
    SerializerRegistry, WriteBuffer,
};

// Storage and cache configuration
pub use strata_adapters::{
    CacheConfig, CacheStats, DurabilityMode, Expected, FileBackend, InMemoryBackend, RetryPolicy,
    StorageBackend, StoredEntry, WriteBatch,
};

// Values, identifiers and errors
pub use strata_common::types::{
    Attribute, Cardinality, DataType, ElementId, ElementKind, SerializerId, Value,
};
pub use strata_common::utils::error::{
    Error, Result, SchemaError, SerializerError, StorageError, TransactionError,
};
