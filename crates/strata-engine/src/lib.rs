//! # strata-engine
//!
//! The main entry point for Strata: database lifecycle, schema management
//! and property store transactions.
//!
//! ## Modules
//!
//! - [`database`] - StrataDB struct and lifecycle management
//! - [`config`] - Configuration options
//! - [`catalog`] - Committed schema and composite indexes
//! - [`management`] - Schema management transactions
//! - [`transaction`] - Data transactions and commit bookkeeping
//! - [`query`] - Equality queries over committed elements

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod database;
pub mod management;
pub mod query;
pub mod transaction;

pub use catalog::Catalog;
pub use config::Config;
pub use database::StrataDB;
pub use management::{IndexBuilder, LabelMaker, ManagementTransaction, PropertyKeyMaker};
pub use query::{GraphQuery, QueryPlan};
pub use transaction::{CommitSummary, ElementRef, Transaction, TransactionManager, TxState};
