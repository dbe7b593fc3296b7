//! # strata-adapters
//!
//! Adapters layer for Strata: storage backends and the permanent cache that
//! sits between transactions and a backend.
//!
//! ## Modules
//!
//! - [`storage`] - Backend contract, in-memory and file backends, retry
//! - [`cache`] - Per-connection permanent cache
//! - [`connection`] - A backend paired with its cache

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod connection;
pub mod storage;

pub use cache::{CacheConfig, CacheStats, PermanentCache};
pub use connection::BackendConnection;
pub use storage::{
    DurabilityMode, Expected, FileBackend, InMemoryBackend, RetryPolicy, RetryingBackend,
    StorageBackend, StoredEntry, WriteBatch, WriteOp,
};
