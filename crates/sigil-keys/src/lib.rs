//! `sigil-keys`: Function registry and key binding for SIGIL.
//!
//! Signing and verification functions are registered once per
//! `(algorithm, purpose[, qualifier])` in a [`FunctionRegistry`].
//! [`KeyFactory`] reads those facets from a key's tag, resolves the
//! function, and returns a [`PrivateKey`] or [`PublicKey`] that owns the
//! key memory.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;

pub mod registry;

pub mod key;

pub mod factory;

pub mod resolution;

pub mod backends;

pub use error::KeyError;
pub use factory::{BindOptions, KeyFactory};
pub use key::{PrivateKey, PublicKey};
pub use registry::{
    FunctionContext, FunctionKey, FunctionRegistry, FunctionTable, SigningFn, VerificationFn,
};
pub use resolution::{FragmentIdentifier, InMemoryKeyLoader, KeyIdentifier, KeyLoader, KeyResolver};

#[cfg(feature = "ring")]
pub use backends::ring::{generate_ed25519, register_ring_functions};
