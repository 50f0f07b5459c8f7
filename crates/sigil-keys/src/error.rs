//! Error types for `sigil-keys`.

use sigil_memory::{CryptoAlgorithm, MemoryError, Purpose, Qualifier};
use thiserror::Error;

/// Errors produced by the function registry, key binding, and backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Failure in the underlying sensitive memory (disposed key, pool error).
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Missing or malformed input (tag without an algorithm, wrong key length).
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    /// The registry was used before `initialize`.
    #[error("function registry is not initialized")]
    NotInitialized,

    /// `initialize` was called on a registry that already holds a table.
    #[error("function registry is already initialized")]
    AlreadyInitialized,

    /// No function is registered for the requested combination.
    #[error("no function registered for {algorithm}/{purpose}{}", qualifier_suffix(.qualifier))]
    NotFound {
        /// Requested algorithm.
        algorithm: CryptoAlgorithm,
        /// Requested purpose.
        purpose: Purpose,
        /// Requested qualifier, if any.
        qualifier: Option<Qualifier>,
    },

    /// The signing function failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The verification function failed to run (not a negative verdict).
    #[error("verification failed: {0}")]
    Verification(String),

    /// A key loader could not fetch key material.
    #[error("key load failed: {0}")]
    Load(String),

    /// A key identifier could not map a reference to a key id.
    #[error("key identification failed: {0}")]
    Identify(String),
}

fn qualifier_suffix(qualifier: &Option<Qualifier>) -> String {
    qualifier
        .as_ref()
        .map_or_else(String::new, |q| format!(" ({q})"))
}
