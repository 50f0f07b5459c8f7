//! Concrete function implementations for the registry.

#[cfg(feature = "ring")]
pub mod ring;
