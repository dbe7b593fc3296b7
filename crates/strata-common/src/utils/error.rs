//! Error types for Strata.
//!
//! Validation errors ([`SerializerError`], [`SchemaError`],
//! [`TransactionError`]) are cheap to clone so that a transaction can keep
//! the cause that made it rollback-only and surface it again on commit.

use thiserror::Error;

use crate::types::{ElementId, TxId};

/// Result type alias for Strata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Serializer registration or value encoding failed.
    #[error("serializer error: {0}")]
    Serializer(#[from] SerializerError),

    /// Schema was referenced or defined inconsistently.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Transaction misuse or commit conflict.
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Encoding or decoding of a stored record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True if a value's exact type had no registered serializer.
    #[must_use]
    pub fn is_unregistered_type(&self) -> bool {
        matches!(self, Error::Serializer(SerializerError::UnregisteredType { .. }))
    }

    /// True if an optimistic commit lost against a concurrent commit.
    #[must_use]
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            Error::Transaction(TransactionError::ConcurrencyConflict { .. })
        )
    }

    /// True if a closed transaction was used.
    #[must_use]
    pub fn is_transaction_closed(&self) -> bool {
        matches!(self, Error::Transaction(TransactionError::Closed { .. }))
    }

    /// True if the storage backend could not be reached.
    #[must_use]
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Error::Storage(StorageError::Unavailable(_)))
    }

    /// Clones validation errors; `None` for I/O and storage failures.
    #[must_use]
    pub fn clone_validation(&self) -> Option<Error> {
        match self {
            Error::Serializer(e) => Some(Error::Serializer(e.clone())),
            Error::Schema(e) => Some(Error::Schema(e.clone())),
            Error::Transaction(e) => Some(Error::Transaction(e.clone())),
            _ => None,
        }
    }
}

/// Serializer registry errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializerError {
    /// No serializer is bound to the value's exact type.
    #[error("no serializer registered for type {type_name}")]
    UnregisteredType {
        /// Name of the offending type.
        type_name: &'static str,
    },

    /// The type is already bound to a different serializer.
    #[error("type {type_name} is already registered with serializer {existing}")]
    DuplicateRegistration {
        /// Name of the value type.
        type_name: &'static str,
        /// Name of the serializer already bound.
        existing: &'static str,
    },

    /// The type is already registered under another serializer id.
    #[error("type {type_name} is already registered as serializer id {existing}, not {requested}")]
    RegisteredUnderOtherId {
        /// Name of the value type.
        type_name: &'static str,
        /// Id the type is bound to.
        existing: u16,
        /// Id that was asked for.
        requested: u16,
    },

    /// A stored value references a serializer id that is not registered.
    #[error("unknown serializer id {0}")]
    UnknownSerializerId(u16),

    /// An explicit serializer id is already taken.
    #[error("serializer id {0} is already in use")]
    SerializerIdInUse(u16),

    /// A serializer was handed a value of another type.
    #[error("serializer for {expected} cannot write a value of type {found}")]
    TypeMismatch {
        /// Type the serializer handles.
        expected: &'static str,
        /// Type it received.
        found: &'static str,
    },

    /// Serialized bytes could not be read back.
    #[error("malformed value: {0}")]
    Malformed(String),
}

/// Schema errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Property key not defined in committed schema.
    #[error("unknown property key '{0}'")]
    UnknownKey(String),

    /// Vertex or edge label not defined in committed schema.
    #[error("unknown label '{0}'")]
    UnknownLabel(String),

    /// A definition collides with an existing one.
    #[error("{kind} '{name}' is already defined")]
    Conflict {
        /// What kind of schema object collided.
        kind: &'static str,
        /// Its name.
        name: String,
    },

    /// Value type does not match the key's declared data type.
    #[error("property key '{key}' expects {expected}, got {found}")]
    DataTypeMismatch {
        /// Property key name.
        key: String,
        /// Declared data type.
        expected: &'static str,
        /// Runtime type of the value.
        found: &'static str,
    },

    /// Index definition is invalid.
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// A vertex label was used for an edge or vice versa.
    #[error("label '{name}' is not a {expected} label")]
    LabelKindMismatch {
        /// Label name.
        name: String,
        /// Expected kind.
        expected: &'static str,
    },
}

/// Transaction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The transaction is committed or rolled back.
    #[error("transaction {tx} is closed ({state})")]
    Closed {
        /// Transaction id.
        tx: TxId,
        /// Terminal state name.
        state: &'static str,
    },

    /// Another transaction committed first, either to an element this one
    /// writes or to state this one reads.
    #[error("concurrent modification of {element}; retry with a new transaction")]
    ConcurrencyConflict {
        /// Element (or schema record) that conflicted.
        element: String,
    },

    /// An element reference from another transaction was used.
    #[error("element reference belongs to transaction {owner}, not {tx}")]
    ForeignElement {
        /// Owning transaction.
        owner: TxId,
        /// Transaction it was used with.
        tx: TxId,
    },

    /// The element was removed in this transaction.
    #[error("element {0} was removed")]
    ElementRemoved(String),

    /// Invalid state transition.
    #[error("invalid transaction state: {0}")]
    InvalidState(String),
}

impl TransactionError {
    /// Conflict on a committed element.
    #[must_use]
    pub fn conflict_on(id: ElementId) -> Self {
        TransactionError::ConcurrencyConflict {
            element: id.to_string(),
        }
    }
}

/// Storage backend errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend unreachable after the retry budget was spent.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Check-and-set failed: the stored version differs from the expected one.
    #[error("version conflict on key {key}")]
    Conflict {
        /// Printable form of the key.
        key: String,
    },

    /// Stored data failed an integrity check.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// The backend connection is closed.
    #[error("backend connection is closed")]
    Closed,
}
