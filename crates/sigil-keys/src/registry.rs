//! Algorithm/purpose function registry.
//!
//! This module provides:
//! - [`FunctionTable`]: builder mapping `(algorithm, purpose[, qualifier])`
//!   to signing and verification functions
//! - [`FunctionRegistry`]: holds one table, installed once, then read
//!   lock-free from any thread
//!
//! # Initialization
//!
//! A registry starts empty. [`FunctionRegistry::initialize`] installs the
//! table exactly once; a second call fails with
//! [`KeyError::AlreadyInitialized`], so resolution never races a table
//! swap. Resolution before initialization fails with
//! [`KeyError::NotInitialized`], and an unmapped combination fails with
//! [`KeyError::NotFound`]. There is no fallback function.
//!
//! Use [`FunctionRegistry::global`] for the process-wide instance, or an
//! owned [`FunctionRegistry`] where isolation matters (tests).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use sigil_memory::{
    BufferAllocator, CryptoAlgorithm, OwnedBuffer, PrivateKeyBytes, Purpose, Qualifier,
};

use crate::error::KeyError;

/// Opaque per-key context handed to every function call.
pub type FunctionContext = Arc<dyn Any + Send + Sync>;

/// Signs `data` with a private key, writing the signature into a buffer
/// rented from the allocator.
///
/// Arguments: private key bytes, data, output allocator, optional context.
pub type SigningFn = Arc<
    dyn Fn(
            PrivateKeyBytes<'_>,
            &[u8],
            &dyn BufferAllocator,
            Option<&FunctionContext>,
        ) -> Result<OwnedBuffer, KeyError>
        + Send
        + Sync,
>;

/// Checks a signature over `data` against a public key.
///
/// Arguments: public key bytes, data, signature bytes, optional context.
/// A well-formed but wrong signature is `Ok(false)`, not an error.
pub type VerificationFn = Arc<
    dyn Fn(&[u8], &[u8], &[u8], Option<&FunctionContext>) -> Result<bool, KeyError>
        + Send
        + Sync,
>;

/// Composite lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionKey {
    /// Algorithm the function implements.
    pub algorithm: CryptoAlgorithm,
    /// Purpose the function serves.
    pub purpose: Purpose,
    /// Optional third axis, for example a signature encoding.
    pub qualifier: Option<Qualifier>,
}

impl FunctionKey {
    /// Key without a qualifier.
    #[must_use]
    pub const fn new(algorithm: CryptoAlgorithm, purpose: Purpose) -> Self {
        Self {
            algorithm,
            purpose,
            qualifier: None,
        }
    }

    /// Key with a qualifier.
    #[must_use]
    pub const fn qualified(
        algorithm: CryptoAlgorithm,
        purpose: Purpose,
        qualifier: Qualifier,
    ) -> Self {
        Self {
            algorithm,
            purpose,
            qualifier: Some(qualifier),
        }
    }

    fn not_found(self) -> KeyError {
        KeyError::NotFound {
            algorithm: self.algorithm,
            purpose: self.purpose,
            qualifier: self.qualifier,
        }
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.algorithm, self.purpose)?;
        if let Some(q) = &self.qualifier {
            write!(f, "/{q}")?;
        }
        Ok(())
    }
}

/// Mapping from [`FunctionKey`] to functions, built before initialization.
///
/// Registering the same key twice replaces the earlier function.
#[derive(Default, Clone)]
pub struct FunctionTable {
    signers: HashMap<FunctionKey, SigningFn>,
    verifiers: HashMap<FunctionKey, VerificationFn>,
}

impl FunctionTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signing function for `(algorithm, purpose)`.
    #[must_use]
    pub fn with_signer<F>(self, algorithm: CryptoAlgorithm, purpose: Purpose, f: F) -> Self
    where
        F: Fn(
                PrivateKeyBytes<'_>,
                &[u8],
                &dyn BufferAllocator,
                Option<&FunctionContext>,
            ) -> Result<OwnedBuffer, KeyError>
            + Send
            + Sync
            + 'static,
    {
        self.insert_signer(FunctionKey::new(algorithm, purpose), Arc::new(f))
    }

    /// Register a signing function for `(algorithm, purpose, qualifier)`.
    #[must_use]
    pub fn with_qualified_signer<F>(
        self,
        algorithm: CryptoAlgorithm,
        purpose: Purpose,
        qualifier: Qualifier,
        f: F,
    ) -> Self
    where
        F: Fn(
                PrivateKeyBytes<'_>,
                &[u8],
                &dyn BufferAllocator,
                Option<&FunctionContext>,
            ) -> Result<OwnedBuffer, KeyError>
            + Send
            + Sync
            + 'static,
    {
        self.insert_signer(
            FunctionKey::qualified(algorithm, purpose, qualifier),
            Arc::new(f),
        )
    }

    /// Register a verification function for `(algorithm, purpose)`.
    #[must_use]
    pub fn with_verifier<F>(self, algorithm: CryptoAlgorithm, purpose: Purpose, f: F) -> Self
    where
        F: Fn(&[u8], &[u8], &[u8], Option<&FunctionContext>) -> Result<bool, KeyError>
            + Send
            + Sync
            + 'static,
    {
        self.insert_verifier(FunctionKey::new(algorithm, purpose), Arc::new(f))
    }

    /// Register a verification function for `(algorithm, purpose, qualifier)`.
    #[must_use]
    pub fn with_qualified_verifier<F>(
        self,
        algorithm: CryptoAlgorithm,
        purpose: Purpose,
        qualifier: Qualifier,
        f: F,
    ) -> Self
    where
        F: Fn(&[u8], &[u8], &[u8], Option<&FunctionContext>) -> Result<bool, KeyError>
            + Send
            + Sync
            + 'static,
    {
        self.insert_verifier(
            FunctionKey::qualified(algorithm, purpose, qualifier),
            Arc::new(f),
        )
    }

    /// Register an already shared signing function.
    #[must_use]
    pub fn insert_signer(mut self, key: FunctionKey, f: SigningFn) -> Self {
        self.signers.insert(key, f);
        self
    }

    /// Register an already shared verification function.
    #[must_use]
    pub fn insert_verifier(mut self, key: FunctionKey, f: VerificationFn) -> Self {
        self.verifiers.insert(key, f);
        self
    }

    /// Number of signing functions.
    #[must_use]
    pub fn signer_count(&self) -> usize {
        self.signers.len()
    }

    /// Number of verification functions.
    #[must_use]
    pub fn verifier_count(&self) -> usize {
        self.verifiers.len()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut signers: Vec<String> = self.signers.keys().map(ToString::to_string).collect();
        let mut verifiers: Vec<String> = self.verifiers.keys().map(ToString::to_string).collect();
        signers.sort_unstable();
        verifiers.sort_unstable();
        f.debug_struct("FunctionTable")
            .field("signers", &signers)
            .field("verifiers", &verifiers)
            .finish()
    }
}

/// Resolves functions by `(algorithm, purpose[, qualifier])`.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    table: OnceLock<FunctionTable>,
}

static GLOBAL: FunctionRegistry = FunctionRegistry::new();

impl FunctionRegistry {
    /// Uninitialized registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: OnceLock::new(),
        }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Install the function table.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::AlreadyInitialized`] if a table is already
    /// installed; the existing table is kept.
    pub fn initialize(&self, table: FunctionTable) -> Result<(), KeyError> {
        let signers = table.signer_count();
        let verifiers = table.verifier_count();
        self.table
            .set(table)
            .map_err(|_| KeyError::AlreadyInitialized)?;
        tracing::info!(signers, verifiers, "function registry initialized");
        Ok(())
    }

    /// Returns `true` once a table is installed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.table.get().is_some()
    }

    fn table(&self) -> Result<&FunctionTable, KeyError> {
        self.table.get().ok_or(KeyError::NotInitialized)
    }

    /// Signing function registered for the combination.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NotInitialized`] before [`initialize`] and
    /// [`KeyError::NotFound`] for an unmapped combination.
    ///
    /// [`initialize`]: FunctionRegistry::initialize
    pub fn resolve_signer(
        &self,
        algorithm: CryptoAlgorithm,
        purpose: Purpose,
        qualifier: Option<&Qualifier>,
    ) -> Result<SigningFn, KeyError> {
        let table = self.table()?;
        let key = FunctionKey {
            algorithm,
            purpose,
            qualifier: qualifier.cloned(),
        };
        match table.signers.get(&key) {
            Some(f) => Ok(Arc::clone(f)),
            None => Err(key.not_found()),
        }
    }

    /// Verification function registered for the combination.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::NotInitialized`] before [`initialize`] and
    /// [`KeyError::NotFound`] for an unmapped combination.
    ///
    /// [`initialize`]: FunctionRegistry::initialize
    pub fn resolve_verifier(
        &self,
        algorithm: CryptoAlgorithm,
        purpose: Purpose,
        qualifier: Option<&Qualifier>,
    ) -> Result<VerificationFn, KeyError> {
        let table = self.table()?;
        let key = FunctionKey {
            algorithm,
            purpose,
            qualifier: qualifier.cloned(),
        };
        match table.verifiers.get(&key) {
            Some(f) => Ok(Arc::clone(f)),
            None => Err(key.not_found()),
        }
    }
}
