//! Utility modules: hashing aliases and the error type.

pub mod error;
pub mod hash;
