//! Identify, load, bind: the three steps from an external reference to a
//! usable key.
//!
//! Identification ([`KeyIdentifier`]) and loading ([`KeyLoader`]) belong to
//! the caller's storage; binding is [`KeyFactory`]. [`KeyResolver`] runs the
//! three in order and lets each step be swapped independently.

use std::collections::HashMap;
use std::sync::RwLock;

use sigil_memory::{BufferAllocator, PrivateKeyMemory, PublicKeyMemory, Tag};
use zeroize::Zeroizing;

use crate::error::KeyError;
use crate::factory::KeyFactory;
use crate::key::{PrivateKey, PublicKey};

/// Maps an external reference (for example a verification-method URL) to a
/// key identifier.
pub trait KeyIdentifier: Send + Sync {
    /// Key identifier for `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Identify`] if the reference cannot be mapped.
    fn identify(&self, reference: &str) -> Result<String, KeyError>;
}

/// Fetches tagged key bytes for an identifier into sensitive memory.
pub trait KeyLoader: Send + Sync {
    /// Load a public key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Load`] if the key is unknown or unreadable.
    fn load_public(
        &self,
        key_id: &str,
        allocator: &dyn BufferAllocator,
    ) -> Result<PublicKeyMemory, KeyError>;

    /// Load a private key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Load`] if the key is unknown or unreadable.
    fn load_private(
        &self,
        key_id: &str,
        allocator: &dyn BufferAllocator,
    ) -> Result<PrivateKeyMemory, KeyError>;
}

/// Identifier that keeps the fragment after `#`, or the whole reference if
/// there is none.
#[derive(Debug, Default, Clone, Copy)]
pub struct FragmentIdentifier;

impl KeyIdentifier for FragmentIdentifier {
    fn identify(&self, reference: &str) -> Result<String, KeyError> {
        let id = reference
            .rsplit_once('#')
            .map_or(reference, |(_, fragment)| fragment);
        if id.is_empty() {
            return Err(KeyError::Identify(format!(
                "reference {reference:?} has an empty key id"
            )));
        }
        Ok(id.to_owned())
    }
}

struct StoredKey {
    bytes: Zeroizing<Vec<u8>>,
    tag: Tag,
}

/// Loader over key material held in process memory.
///
/// Stored bytes are zeroized when replaced or when the loader is dropped;
/// every load copies them into a fresh buffer from the caller's allocator.
#[derive(Default)]
pub struct InMemoryKeyLoader {
    public: RwLock<HashMap<String, StoredKey>>,
    private: RwLock<HashMap<String, StoredKey>>,
}

impl InMemoryKeyLoader {
    /// Empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store public key bytes under `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Load`] if the store lock is poisoned.
    pub fn insert_public(
        &self,
        key_id: impl Into<String>,
        bytes: &[u8],
        tag: Tag,
    ) -> Result<(), KeyError> {
        Self::insert(&self.public, key_id.into(), bytes, tag)
    }

    /// Store private key bytes under `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Load`] if the store lock is poisoned.
    pub fn insert_private(
        &self,
        key_id: impl Into<String>,
        bytes: &[u8],
        tag: Tag,
    ) -> Result<(), KeyError> {
        Self::insert(&self.private, key_id.into(), bytes, tag)
    }

    fn insert(
        store: &RwLock<HashMap<String, StoredKey>>,
        key_id: String,
        bytes: &[u8],
        tag: Tag,
    ) -> Result<(), KeyError> {
        let mut map = store
            .write()
            .map_err(|_| KeyError::Load("key store lock poisoned".into()))?;
        map.insert(
            key_id,
            StoredKey {
                bytes: Zeroizing::new(bytes.to_vec()),
                tag,
            },
        );
        Ok(())
    }

    fn copy_out<T>(
        store: &RwLock<HashMap<String, StoredKey>>,
        key_id: &str,
        build: impl FnOnce(&[u8], Tag) -> Result<T, sigil_memory::MemoryError>,
    ) -> Result<T, KeyError> {
        let map = store
            .read()
            .map_err(|_| KeyError::Load("key store lock poisoned".into()))?;
        let stored = map
            .get(key_id)
            .ok_or_else(|| KeyError::Load(format!("no key stored under {key_id:?}")))?;
        Ok(build(stored.bytes.as_slice(), stored.tag.clone())?)
    }
}

impl KeyLoader for InMemoryKeyLoader {
    fn load_public(
        &self,
        key_id: &str,
        allocator: &dyn BufferAllocator,
    ) -> Result<PublicKeyMemory, KeyError> {
        Self::copy_out(&self.public, key_id, |bytes, tag| {
            PublicKeyMemory::copy_from(allocator, bytes, tag)
        })
    }

    fn load_private(
        &self,
        key_id: &str,
        allocator: &dyn BufferAllocator,
    ) -> Result<PrivateKeyMemory, KeyError> {
        Self::copy_out(&self.private, key_id, |bytes, tag| {
            PrivateKeyMemory::copy_from(allocator, bytes, tag)
        })
    }
}

impl std::fmt::Debug for InMemoryKeyLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InMemoryKeyLoader(***)")
    }
}

/// Identify, load, and bind in one call.
pub struct KeyResolver<'r, I, L> {
    identifier: I,
    loader: L,
    factory: KeyFactory<'r>,
}

impl<'r, I: KeyIdentifier, L: KeyLoader> KeyResolver<'r, I, L> {
    /// Resolver composed of the three steps.
    pub const fn new(identifier: I, loader: L, factory: KeyFactory<'r>) -> Self {
        Self {
            identifier,
            loader,
            factory,
        }
    }

    /// Resolve `reference` to a public key, loading into `allocator`.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error: [`KeyError::Identify`],
    /// [`KeyError::Load`], or any binding error from [`KeyFactory`].
    pub fn resolve_public_key(
        &self,
        reference: &str,
        allocator: &dyn BufferAllocator,
    ) -> Result<PublicKey, KeyError> {
        let key_id = self.identifier.identify(reference)?;
        let memory = self.loader.load_public(&key_id, allocator)?;
        self.factory.create_public_key(key_id, memory)
    }

    /// Resolve `reference` to a private key, loading into `allocator`.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error: [`KeyError::Identify`],
    /// [`KeyError::Load`], or any binding error from [`KeyFactory`].
    pub fn resolve_private_key(
        &self,
        reference: &str,
        allocator: &dyn BufferAllocator,
    ) -> Result<PrivateKey, KeyError> {
        let key_id = self.identifier.identify(reference)?;
        let memory = self.loader.load_private(&key_id, allocator)?;
        self.factory.create_private_key(key_id, memory)
    }
}
