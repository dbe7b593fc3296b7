//! StrataDB main database struct.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use strata_adapters::{
    BackendConnection, CacheStats, FileBackend, InMemoryBackend, RetryingBackend, StorageBackend,
};
use strata_common::utils::error::{Result, TransactionError};
use strata_core::{SchemaSnapshot, SerializerRegistry};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::management::ManagementTransaction;
use crate::transaction::{Transaction, TransactionManager};

/// The main Strata database.
///
/// Owns one backend connection with its permanent cache, the serializer
/// registry, the schema catalog and the transaction manager. Serializers
/// are registered on a [`SerializerRegistry`] before the database is built
/// and are fixed from then on.
pub struct StrataDB {
    /// Database configuration.
    config: Config,
    /// Closed-world serializer registry.
    registry: Arc<SerializerRegistry>,
    /// Backend connection and its cache.
    connection: Arc<BackendConnection>,
    /// Committed schema and composite indexes.
    catalog: Arc<Catalog>,
    /// Id, epoch and commit-order bookkeeping.
    tx_manager: Arc<TransactionManager>,
    /// Whether the database is open.
    is_open: RwLock<bool>,
}

impl StrataDB {
    /// Creates a new in-memory database with only builtin serializers.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_engine::StrataDB;
    ///
    /// let db = StrataDB::new_in_memory();
    /// assert!(db.schema().is_empty());
    /// ```
    #[must_use]
    pub fn new_in_memory() -> Self {
        let config = Config::in_memory();
        let backend = RetryingBackend::new(InMemoryBackend::new(), config.retry);
        let connection = BackendConnection::open(Arc::new(backend), config.cache);
        Self::assemble(
            config,
            Arc::new(SerializerRegistry::new()),
            connection,
            Catalog::empty(),
            TransactionManager::new(),
        )
    }

    /// Opens or creates a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the stored
    /// log or schema cannot be read.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use strata_engine::StrataDB;
    ///
    /// let db = StrataDB::open("./my_graph").expect("Failed to open database");
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(Config::persistent(path.as_ref()))
    }

    /// Creates a database with the given configuration and builtin
    /// serializers only.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened or recovered.
    pub fn with_config(config: Config) -> Result<Self> {
        Self::with_registry(config, SerializerRegistry::new())
    }

    /// Creates a database with application serializers.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened, or stored data
    /// uses a serializer `registry` does not have.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::{AttributeSerializer, ReadBuffer, SerializerRegistry, WriteBuffer};
    /// use strata_engine::{Config, StrataDB};
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Celsius(f64);
    ///
    /// struct CelsiusSerializer;
    ///
    /// impl AttributeSerializer<Celsius> for CelsiusSerializer {
    ///     fn write(&self, buf: &mut WriteBuffer, value: &Celsius) -> strata_common::Result<()> {
    ///         buf.put_f64(value.0);
    ///         Ok(())
    ///     }
    ///     fn read(&self, buf: &mut ReadBuffer<'_>) -> strata_common::Result<Celsius> {
    ///         Ok(Celsius(buf.get_f64()?))
    ///     }
    /// }
    ///
    /// let mut registry = SerializerRegistry::new();
    /// registry.register::<Celsius, _>(CelsiusSerializer).unwrap();
    /// let db = StrataDB::with_registry(Config::in_memory(), registry).unwrap();
    /// assert!(db.registry().is_registered::<Celsius>());
    /// ```
    pub fn with_registry(config: Config, registry: SerializerRegistry) -> Result<Self> {
        match config.path.clone() {
            Some(path) => {
                let backend = FileBackend::open(&path, config.durability)?;
                tracing::info!("opened database at {}", path.display());
                Self::with_backend(backend, config, registry)
            }
            None => Self::with_backend(InMemoryBackend::new(), config, registry),
        }
    }

    /// Creates a database over any backend.
    ///
    /// The backend is wrapped in a [`RetryingBackend`] using the configured
    /// retry policy, so transient unavailability is retried before it
    /// reaches a transaction. The schema and composite indexes are loaded
    /// from whatever the backend already holds.
    ///
    /// # Errors
    ///
    /// Returns an error if stored records cannot be read or decoded.
    pub fn with_backend<B>(backend: B, config: Config, registry: SerializerRegistry) -> Result<Self>
    where
        B: StorageBackend + 'static,
    {
        let backend = RetryingBackend::new(backend, config.retry);
        let connection = BackendConnection::open(Arc::new(backend), config.cache);
        let (catalog, recovered) = match Catalog::load(&connection, &registry) {
            Ok(loaded) => loaded,
            Err(e) => {
                if let Err(close_err) = connection.close() {
                    tracing::warn!("Failed to close backend after failed open: {}", close_err);
                }
                return Err(e);
            }
        };
        let tx_manager = TransactionManager::recovered(recovered.max_element, recovered.max_epoch);
        Ok(Self::assemble(
            config,
            Arc::new(registry),
            connection,
            catalog,
            tx_manager,
        ))
    }

    fn assemble(
        config: Config,
        registry: Arc<SerializerRegistry>,
        connection: BackendConnection,
        catalog: Catalog,
        tx_manager: TransactionManager,
    ) -> Self {
        Self {
            config,
            registry,
            connection: Arc::new(connection),
            catalog: Arc::new(catalog),
            tx_manager: Arc::new(tx_manager),
            is_open: RwLock::new(true),
        }
    }

    /// Opens a schema management transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is closed.
    pub fn open_management(&self) -> Result<ManagementTransaction> {
        self.ensure_open()?;
        Ok(ManagementTransaction::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.connection),
            Arc::clone(&self.catalog),
            Arc::clone(&self.tx_manager),
        ))
    }

    /// Opens a data transaction that sees the schema committed so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is closed.
    pub fn new_transaction(&self) -> Result<Transaction> {
        self.ensure_open()?;
        Ok(Transaction::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.connection),
            Arc::clone(&self.catalog),
            Arc::clone(&self.tx_manager),
        ))
    }

    /// The latest committed schema.
    #[must_use]
    pub fn schema(&self) -> Arc<SchemaSnapshot> {
        self.catalog.snapshot()
    }

    /// The serializer registry.
    #[must_use]
    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identity of the backend connection.
    #[must_use]
    pub fn backend_id(&self) -> &str {
        self.connection.id()
    }

    /// Permanent cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.connection.cache_stats()
    }

    /// Returns the transaction manager.
    #[must_use]
    pub fn tx_manager(&self) -> &Arc<TransactionManager> {
        &self.tx_manager
    }

    /// Returns true until [`close`](Self::close).
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Closes the database.
    ///
    /// This will:
    /// - Tear down the permanent cache
    /// - Close the backend connection
    ///
    /// Transactions still open afterwards fail on their next backend
    /// access. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to close.
    pub fn close(&self) -> Result<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        *is_open = false;
        self.catalog.indexes().clear();
        self.connection.close()?;
        tracing::info!("closed database on {}", self.connection.id());
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TransactionError::InvalidState("database is closed".to_string()).into())
        }
    }
}

impl Drop for StrataDB {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close database on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_adapters::DurabilityMode;
    use strata_common::types::DataType;

    #[test]
    fn test_in_memory_lifecycle() {
        let db = StrataDB::new_in_memory();
        assert!(db.is_open());
        assert!(db.backend_id().starts_with("memory-"));
        db.close().unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
        assert!(db.new_transaction().is_err());
        assert!(db.open_management().is_err());
    }

    #[test]
    fn test_persistent_schema_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::persistent(dir.path()).with_durability(DurabilityMode::NoSync);
        {
            let db = StrataDB::with_config(config.clone()).unwrap();
            let mut mgmt = db.open_management().unwrap();
            mgmt.make_property_key("name").data_type(DataType::String).make().unwrap();
            mgmt.make_vertex_label("person").make().unwrap();
            mgmt.commit().unwrap();

            let mut tx = db.new_transaction().unwrap();
            let v = tx.add_vertex("person").unwrap();
            tx.property(v, "name", "ada").unwrap();
            tx.commit().unwrap();
        }

        let db = StrataDB::with_config(config).unwrap();
        assert!(db.backend_id().starts_with("file:"));
        assert!(db.schema().has_vertex_label("person"));
        let mut tx = db.new_transaction().unwrap();
        let found = tx.query().has("name", "ada").vertices().unwrap();
        assert_eq!(found.len(), 1);

        // New ids continue after the recovered ones.
        let v = tx.add_vertex("person").unwrap();
        let summary = tx.commit().unwrap();
        assert_eq!(summary.id_of(v).unwrap().as_u64(), 1);
    }

    #[test]
    fn test_transactions_fail_after_close() {
        let db = StrataDB::new_in_memory();
        let mut mgmt = db.open_management().unwrap();
        mgmt.make_vertex_label("v").make().unwrap();
        mgmt.commit().unwrap();

        let mut tx = db.new_transaction().unwrap();
        tx.add_vertex("v").unwrap();
        db.close().unwrap();
        let err = tx.commit().unwrap_err();
        assert!(matches!(
            err,
            strata_common::Error::Storage(strata_common::utils::error::StorageError::Closed)
        ));
        assert!(!tx.is_open());
    }
}
