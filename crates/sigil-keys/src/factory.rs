//! Binding key memory to registered functions.
//!
//! The factory reads [`CryptoAlgorithm`] and [`Purpose`] from the memory's
//! tag, resolves the matching function in a [`FunctionRegistry`], and wraps
//! both in a [`PrivateKey`] or [`PublicKey`]. A qualifier comes from
//! [`BindOptions`] or, failing that, from a [`Qualifier`] facet on the tag.

use sigil_memory::{CryptoAlgorithm, PrivateKeyMemory, PublicKeyMemory, Purpose, Qualifier, Tag};

use crate::error::KeyError;
use crate::key::{PrivateKey, PublicKey};
use crate::registry::{FunctionContext, FunctionRegistry};

/// Optional inputs to a bind.
#[derive(Default, Clone)]
pub struct BindOptions {
    qualifier: Option<Qualifier>,
    context: Option<FunctionContext>,
}

impl BindOptions {
    /// No qualifier, no context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve with this qualifier, overriding any on the tag.
    #[must_use]
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// Default context passed to every call on the key.
    #[must_use]
    pub fn context(mut self, context: FunctionContext) -> Self {
        self.context = Some(context);
        self
    }
}

impl std::fmt::Debug for BindOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindOptions")
            .field("qualifier", &self.qualifier)
            .field("context", &self.context.is_some())
            .finish()
    }
}

/// Creates keys from tagged key memory.
#[derive(Debug, Clone, Copy)]
pub struct KeyFactory<'r> {
    registry: &'r FunctionRegistry,
}

impl KeyFactory<'static> {
    /// Factory over [`FunctionRegistry::global`].
    #[must_use]
    pub fn global() -> Self {
        Self::new(FunctionRegistry::global())
    }
}

impl<'r> KeyFactory<'r> {
    /// Factory over `registry`.
    #[must_use]
    pub const fn new(registry: &'r FunctionRegistry) -> Self {
        Self { registry }
    }

    /// Bind private key memory to its signing function.
    ///
    /// # Errors
    ///
    /// See [`KeyFactory::create_private_key_with`].
    pub fn create_private_key(
        &self,
        id: impl Into<String>,
        memory: PrivateKeyMemory,
    ) -> Result<PrivateKey, KeyError> {
        self.create_private_key_with(id, memory, BindOptions::default())
    }

    /// Bind private key memory to its signing function with explicit options.
    ///
    /// # Errors
    ///
    /// - [`KeyError::ArgumentInvalid`] if the tag lacks an algorithm or purpose
    /// - [`KeyError::Memory`] if the memory was already disposed
    /// - [`KeyError::NotInitialized`] / [`KeyError::NotFound`] from resolution
    pub fn create_private_key_with(
        &self,
        id: impl Into<String>,
        memory: PrivateKeyMemory,
        options: BindOptions,
    ) -> Result<PrivateKey, KeyError> {
        memory.as_slice()?;
        let (algorithm, purpose) = dispatch_facets(memory.tag())?;
        let qualifier = options
            .qualifier
            .or_else(|| memory.tag().get::<Qualifier>().cloned());
        let signer = self
            .registry
            .resolve_signer(algorithm, purpose, qualifier.as_ref())?;
        let id = id.into();
        tracing::debug!(%id, %algorithm, %purpose, "bound private key");
        Ok(PrivateKey::new(
            id,
            algorithm,
            qualifier,
            memory,
            signer,
            options.context,
        ))
    }

    /// Bind public key memory to its verification function.
    ///
    /// # Errors
    ///
    /// See [`KeyFactory::create_public_key_with`].
    pub fn create_public_key(
        &self,
        id: impl Into<String>,
        memory: PublicKeyMemory,
    ) -> Result<PublicKey, KeyError> {
        self.create_public_key_with(id, memory, BindOptions::default())
    }

    /// Bind public key memory to its verification function with explicit
    /// options.
    ///
    /// # Errors
    ///
    /// - [`KeyError::ArgumentInvalid`] if the tag lacks an algorithm or purpose
    /// - [`KeyError::Memory`] if the memory was already disposed
    /// - [`KeyError::NotInitialized`] / [`KeyError::NotFound`] from resolution
    pub fn create_public_key_with(
        &self,
        id: impl Into<String>,
        memory: PublicKeyMemory,
        options: BindOptions,
    ) -> Result<PublicKey, KeyError> {
        memory.as_slice()?;
        let (algorithm, purpose) = dispatch_facets(memory.tag())?;
        let qualifier = options
            .qualifier
            .or_else(|| memory.tag().get::<Qualifier>().cloned());
        let verifier = self
            .registry
            .resolve_verifier(algorithm, purpose, qualifier.as_ref())?;
        let id = id.into();
        tracing::debug!(%id, %algorithm, %purpose, "bound public key");
        Ok(PublicKey::new(id, algorithm, memory, verifier, options.context))
    }
}

fn dispatch_facets(tag: &Tag) -> Result<(CryptoAlgorithm, Purpose), KeyError> {
    let algorithm = tag
        .get::<CryptoAlgorithm>()
        .copied()
        .ok_or_else(|| KeyError::ArgumentInvalid(format!("tag {tag:?} has no algorithm")))?;
    let purpose = tag
        .get::<Purpose>()
        .copied()
        .ok_or_else(|| KeyError::ArgumentInvalid(format!("tag {tag:?} has no purpose")))?;
    Ok((algorithm, purpose))
}
