//! Keys: key memory bound to the function that operates on it.
//!
//! A [`PrivateKey`] closes over its [`PrivateKeyMemory`] and a resolved
//! signing function; a [`PublicKey`] over its [`PublicKeyMemory`] and a
//! verification function. Both are built by
//! [`KeyFactory`](crate::factory::KeyFactory) and own their memory: disposing
//! or dropping the key zeroes and releases it.

use std::fmt;

use sigil_memory::{
    tags, BufferAllocator, CryptoAlgorithm, PrivateKeyMemory, PublicKeyMemory, Qualifier,
    Signature, Tag,
};

use crate::error::KeyError;
use crate::registry::{FunctionContext, SigningFn, VerificationFn};

/// Private key ready to sign.
pub struct PrivateKey {
    id: String,
    algorithm: CryptoAlgorithm,
    qualifier: Option<Qualifier>,
    memory: PrivateKeyMemory,
    signer: SigningFn,
    context: Option<FunctionContext>,
}

impl PrivateKey {
    pub(crate) fn new(
        id: String,
        algorithm: CryptoAlgorithm,
        qualifier: Option<Qualifier>,
        memory: PrivateKeyMemory,
        signer: SigningFn,
        context: Option<FunctionContext>,
    ) -> Self {
        Self {
            id,
            algorithm,
            qualifier,
            memory,
            signer,
            context,
        }
    }

    /// Key identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Algorithm the key was bound for.
    #[must_use]
    pub const fn algorithm(&self) -> CryptoAlgorithm {
        self.algorithm
    }

    /// Tag of the underlying memory.
    #[must_use]
    pub const fn tag(&self) -> &Tag {
        self.memory.tag()
    }

    /// Sign `data`, renting the signature buffer from `allocator`.
    ///
    /// The returned [`Signature`] is tagged with this key's algorithm (and
    /// qualifier, if the key was bound with one).
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Memory`] if the key was disposed or the allocator
    /// fails, or whatever the signing function returns.
    pub fn sign(
        &self,
        data: &[u8],
        allocator: &dyn BufferAllocator,
    ) -> Result<Signature, KeyError> {
        let signer = &self.signer;
        let context = self.context.as_ref();
        let owner = self
            .memory
            .with_key_bytes(|bytes, _| signer(bytes, data, allocator, context))??;
        let tag = match &self.qualifier {
            Some(q) => tags::signature(self.algorithm).with(q.clone()),
            None => tags::signature(self.algorithm),
        };
        Ok(Signature::from_owner(owner, tag)?)
    }

    /// Zero and release the key memory. Idempotent.
    pub fn dispose(&mut self) {
        self.memory.dispose();
    }

    /// Returns `true` once disposed.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.memory.is_disposed()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

/// Public key ready to verify.
pub struct PublicKey {
    id: String,
    algorithm: CryptoAlgorithm,
    memory: PublicKeyMemory,
    verifier: VerificationFn,
    context: Option<FunctionContext>,
}

impl PublicKey {
    pub(crate) fn new(
        id: String,
        algorithm: CryptoAlgorithm,
        memory: PublicKeyMemory,
        verifier: VerificationFn,
        context: Option<FunctionContext>,
    ) -> Self {
        Self {
            id,
            algorithm,
            memory,
            verifier,
            context,
        }
    }

    /// Key identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Algorithm the key was bound for.
    #[must_use]
    pub const fn algorithm(&self) -> CryptoAlgorithm {
        self.algorithm
    }

    /// Tag of the underlying memory.
    #[must_use]
    pub const fn tag(&self) -> &Tag {
        self.memory.tag()
    }

    /// Raw public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Memory`] if the key was disposed.
    pub fn as_bytes(&self) -> Result<&[u8], KeyError> {
        Ok(self.memory.as_slice()?)
    }

    /// Check `signature` over `data` using the key's default context.
    ///
    /// # Errors
    ///
    /// See [`PublicKey::verify_with_context`].
    pub fn verify(&self, data: &[u8], signature: &Signature) -> Result<bool, KeyError> {
        self.verify_with_context(data, signature, self.context.as_ref())
    }

    /// Check `signature` over `data`, passing `context` to the function in
    /// place of the key's default.
    ///
    /// A well-formed signature that does not match is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// - [`KeyError::ArgumentInvalid`] if the signature is tagged with a
    ///   different algorithm
    /// - [`KeyError::Memory`] if the key or the signature was disposed
    /// - whatever the verification function returns
    pub fn verify_with_context(
        &self,
        data: &[u8],
        signature: &Signature,
        context: Option<&FunctionContext>,
    ) -> Result<bool, KeyError> {
        if let Some(algorithm) = signature.algorithm() {
            if algorithm != self.algorithm {
                return Err(KeyError::ArgumentInvalid(format!(
                    "{algorithm} signature presented to a {} key",
                    self.algorithm
                )));
            }
        }
        let signature = signature.as_slice()?;
        let verifier = &self.verifier;
        self.memory
            .with_key_bytes(|key, _| verifier(key, data, signature, context))?
    }

    /// Zero and release the key memory. Idempotent.
    pub fn dispose(&mut self) {
        self.memory.dispose();
    }

    /// Returns `true` once disposed.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.memory.is_disposed()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}
