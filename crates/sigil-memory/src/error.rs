//! Error types for `sigil-memory`.

use thiserror::Error;

/// Errors produced by the pool and the sensitive memory types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Null, empty, or out-of-range input (zero-size rent, contradictory tag).
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    /// The named object was already disposed.
    #[error("use after dispose: {0}")]
    UseAfterDispose(&'static str),

    /// A segment was returned that is not currently recorded as rented.
    #[error("double release of segment {segment} in slab {slab}")]
    DoubleRelease {
        /// Identifier of the slab the segment claims to belong to.
        slab: u64,
        /// Index of the segment inside the slab.
        segment: usize,
    },

    /// Allocator bookkeeping is inconsistent (slab mismatch, poisoned lock).
    #[error("allocator corruption: {0}")]
    Corruption(String),

    /// Pool configuration is invalid or could not be parsed.
    #[error("invalid pool configuration: {0}")]
    Config(String),

    /// A pool metric could not be created or registered.
    #[error("metrics error: {0}")]
    Metrics(String),
}

impl From<prometheus::Error> for MemoryError {
    fn from(e: prometheus::Error) -> Self {
        Self::Metrics(e.to_string())
    }
}
