//! Ownership-tracked sensitive memory.
//!
//! This module provides:
//! - [`SensitiveMemory`]: one rented buffer plus its [`Tag`], disposed
//!   exactly once, compared by content
//! - [`PublicKeyMemory`], [`PrivateKeyMemory`], [`Signature`]: typed
//!   wrappers with kind-specific access
//! - [`SensitiveBuffer`]: the capability set they all share
//!
//! # Disposal
//!
//! [`SensitiveMemory::dispose`] zeroes the bytes and hands the buffer back
//! to its allocator; every later access fails with
//! [`MemoryError::UseAfterDispose`]. Dropping does the same. The zeroing
//! happens here even though the pool zeroes too: the buffer may come from
//! any [`BufferAllocator`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use data_encoding::HEXLOWER;
use zeroize::Zeroize;

use crate::allocator::{BufferAllocator, OwnedBuffer};
use crate::error::MemoryError;
use crate::facets::{BufferKind, CryptoAlgorithm};
use crate::tag::Tag;

/// The one buffer shared by every explicitly empty value.
static EMPTY: [u8; 0] = [];

/// Number of leading signature bytes shown in debug output.
const PREVIEW_LEN: usize = 4;

enum Backing {
    Owned(OwnedBuffer),
    Empty,
    Disposed,
}

/// Constant-time content comparison.
///
/// Length is not secret (it follows from the algorithm), so unequal
/// lengths return early.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// One rented buffer of secret-adjacent bytes plus its [`Tag`].
pub struct SensitiveMemory {
    backing: Backing,
    tag: Tag,
}

impl SensitiveMemory {
    /// Take ownership of a rented buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ArgumentInvalid`] if the buffer is empty; use
    /// [`SensitiveMemory::empty`] for explicitly empty values.
    pub fn from_owner(owner: OwnedBuffer, tag: Tag) -> Result<Self, MemoryError> {
        if owner.as_slice().is_empty() {
            return Err(MemoryError::ArgumentInvalid(
                "sensitive memory needs a non-empty buffer; use SensitiveMemory::empty".into(),
            ));
        }
        Ok(Self {
            backing: Backing::Owned(owner),
            tag,
        })
    }

    /// Rent `bytes.len()` bytes from `allocator` and copy `bytes` in.
    ///
    /// The caller remains responsible for zeroizing `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ArgumentInvalid`] if `bytes` is empty, or
    /// whatever the allocator returns.
    pub fn copy_from(
        allocator: &dyn BufferAllocator,
        bytes: &[u8],
        tag: Tag,
    ) -> Result<Self, MemoryError> {
        if bytes.is_empty() {
            return Err(MemoryError::ArgumentInvalid(
                "cannot copy an empty value; use SensitiveMemory::empty".into(),
            ));
        }
        let mut owner = allocator.rent(bytes.len())?;
        owner.as_mut_slice().copy_from_slice(bytes);
        Self::from_owner(owner, tag)
    }

    /// A value backed by the shared empty buffer.
    ///
    /// It is never pooled and never disposed: [`dispose`](Self::dispose) is
    /// a no-op and access always succeeds.
    #[must_use]
    pub const fn empty(tag: Tag) -> Self {
        Self {
            backing: Backing::Empty,
            tag,
        }
    }

    /// Read-only view of the bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UseAfterDispose`] once disposed.
    pub fn as_slice(&self) -> Result<&[u8], MemoryError> {
        match &self.backing {
            Backing::Owned(owner) => Ok(owner.as_slice()),
            Backing::Empty => Ok(&EMPTY),
            Backing::Disposed => Err(MemoryError::UseAfterDispose("sensitive memory")),
        }
    }

    /// Read-only memory handle over the bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UseAfterDispose`] once disposed.
    pub fn as_memory(&self) -> Result<MemoryView<'_>, MemoryError> {
        self.as_slice().map(|bytes| MemoryView { bytes })
    }

    /// Mutable access for filling freshly rented memory.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UseAfterDispose`] once disposed.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8], MemoryError> {
        match &mut self.backing {
            Backing::Owned(owner) => Ok(owner.as_mut_slice()),
            Backing::Empty => Ok(&mut []),
            Backing::Disposed => Err(MemoryError::UseAfterDispose("sensitive memory")),
        }
    }

    /// The metadata describing these bytes.
    #[must_use]
    pub const fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Byte length; zero once disposed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().map_or(0, <[u8]>::len)
    }

    /// Returns `true` for empty or disposed values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`dispose`](Self::dispose) has released the buffer.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        matches!(self.backing, Backing::Disposed)
    }

    /// Returns `true` if this value uses the shared empty buffer.
    #[must_use]
    pub const fn is_empty_singleton(&self) -> bool {
        matches!(self.backing, Backing::Empty)
    }

    /// Zero the bytes and release the buffer. Idempotent.
    ///
    /// Never fails: if the allocator rejects the return (for example it was
    /// disposed first during shutdown), the failure is logged and swallowed.
    pub fn dispose(&mut self) {
        match std::mem::replace(&mut self.backing, Backing::Disposed) {
            Backing::Owned(mut owner) => {
                owner.as_mut_slice().zeroize();
                if let Err(e) = owner.release() {
                    tracing::warn!(error = %e, "releasing sensitive memory failed");
                }
            }
            Backing::Empty => self.backing = Backing::Empty,
            Backing::Disposed => {}
        }
    }
}

impl Drop for SensitiveMemory {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Content equality; a disposed value equals nothing.
impl PartialEq for SensitiveMemory {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_slice(), other.as_slice()) {
            (Ok(a), Ok(b)) => constant_time_eq(a, b),
            _ => false,
        }
    }
}

/// Hashes every byte. Meant for tests and diagnostics, not hot paths.
impl Hash for SensitiveMemory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.as_slice() {
            Ok(bytes) => bytes.hash(state),
            Err(_) => state.write_u8(0xFF),
        }
    }
}

impl fmt::Debug for SensitiveMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disposed() {
            f.write_str("SensitiveMemory(disposed)")
        } else {
            f.write_str("SensitiveMemory(***)")
        }
    }
}

/// Borrowed read-only memory handle returned by [`SensitiveMemory::as_memory`].
#[derive(Clone, Copy)]
pub struct MemoryView<'a> {
    bytes: &'a [u8],
}

impl MemoryView<'_> {
    /// Byte length of the view.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the view is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Deref for MemoryView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl AsRef<[u8]> for MemoryView<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl fmt::Debug for MemoryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryView<{}>(***)", self.bytes.len())
    }
}

/// Capabilities shared by every kind of sensitive buffer.
pub trait SensitiveBuffer {
    /// Read-only view of the bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UseAfterDispose`] once disposed.
    fn as_slice(&self) -> Result<&[u8], MemoryError>;

    /// The metadata describing the bytes.
    fn tag(&self) -> &Tag;

    /// Zero and release the buffer. Idempotent.
    fn dispose(&mut self);

    /// Returns `true` once disposed.
    fn is_disposed(&self) -> bool;
}

impl SensitiveBuffer for SensitiveMemory {
    fn as_slice(&self) -> Result<&[u8], MemoryError> {
        Self::as_slice(self)
    }

    fn tag(&self) -> &Tag {
        Self::tag(self)
    }

    fn dispose(&mut self) {
        Self::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        Self::is_disposed(self)
    }
}

fn check_kind(tag: &Tag, expected: BufferKind) -> Result<(), MemoryError> {
    match tag.get::<BufferKind>() {
        Some(kind) if *kind != expected => Err(MemoryError::ArgumentInvalid(format!(
            "tag declares {kind:?} but a {expected:?} buffer was requested"
        ))),
        _ => Ok(()),
    }
}

/// Typed wrapper over [`SensitiveMemory`] for one [`BufferKind`].
///
/// A tag whose `BufferKind` facet names a different kind is rejected; a tag
/// without the facet is accepted as-is.
macro_rules! sensitive_kind {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        pub struct $name(SensitiveMemory);

        impl $name {
            /// Take ownership of a rented buffer.
            ///
            /// # Errors
            ///
            /// Returns [`MemoryError::ArgumentInvalid`] if the buffer is
            /// empty or the tag declares a different buffer kind.
            pub fn from_owner(owner: OwnedBuffer, tag: Tag) -> Result<Self, MemoryError> {
                check_kind(&tag, $kind)?;
                SensitiveMemory::from_owner(owner, tag).map(Self)
            }

            /// Rent from `allocator` and copy `bytes` in.
            ///
            /// # Errors
            ///
            /// Returns [`MemoryError::ArgumentInvalid`] if `bytes` is empty
            /// or the tag declares a different buffer kind, or whatever the
            /// allocator returns.
            pub fn copy_from(
                allocator: &dyn BufferAllocator,
                bytes: &[u8],
                tag: Tag,
            ) -> Result<Self, MemoryError> {
                check_kind(&tag, $kind)?;
                SensitiveMemory::copy_from(allocator, bytes, tag).map(Self)
            }

            /// Wrap existing sensitive memory.
            ///
            /// # Errors
            ///
            /// Returns [`MemoryError::ArgumentInvalid`] if its tag declares
            /// a different buffer kind.
            pub fn from_memory(memory: SensitiveMemory) -> Result<Self, MemoryError> {
                check_kind(memory.tag(), $kind)?;
                Ok(Self(memory))
            }

            /// A value backed by the shared empty buffer.
            #[must_use]
            pub const fn empty(tag: Tag) -> Self {
                Self(SensitiveMemory::empty(tag))
            }

            /// Read-only view of the bytes.
            ///
            /// # Errors
            ///
            /// Returns [`MemoryError::UseAfterDispose`] once disposed.
            pub fn as_slice(&self) -> Result<&[u8], MemoryError> {
                self.0.as_slice()
            }

            /// Read-only memory handle over the bytes.
            ///
            /// # Errors
            ///
            /// Returns [`MemoryError::UseAfterDispose`] once disposed.
            pub fn as_memory(&self) -> Result<MemoryView<'_>, MemoryError> {
                self.0.as_memory()
            }

            /// The metadata describing these bytes.
            #[must_use]
            pub const fn tag(&self) -> &Tag {
                self.0.tag()
            }

            /// Byte length; zero once disposed.
            #[must_use]
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// Returns `true` for empty or disposed values.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Zero the bytes and release the buffer. Idempotent.
            pub fn dispose(&mut self) {
                self.0.dispose();
            }

            /// Returns `true` once disposed.
            #[must_use]
            pub const fn is_disposed(&self) -> bool {
                self.0.is_disposed()
            }

            /// The untyped memory underneath.
            #[must_use]
            pub const fn memory(&self) -> &SensitiveMemory {
                &self.0
            }
        }

        impl SensitiveBuffer for $name {
            fn as_slice(&self) -> Result<&[u8], MemoryError> {
                self.0.as_slice()
            }

            fn tag(&self) -> &Tag {
                self.0.tag()
            }

            fn dispose(&mut self) {
                self.0.dispose();
            }

            fn is_disposed(&self) -> bool {
                self.0.is_disposed()
            }
        }

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }
    };
}

sensitive_kind!(
    /// Public key bytes.
    PublicKeyMemory,
    BufferKind::PublicKey
);

sensitive_kind!(
    /// Private key bytes. Never printed, never serialized.
    PrivateKeyMemory,
    BufferKind::PrivateKey
);

sensitive_kind!(
    /// Signature bytes produced by a signing function.
    Signature,
    BufferKind::Signature
);

impl PublicKeyMemory {
    /// Run `f` over the raw public key bytes and their tag.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UseAfterDispose`] once disposed.
    pub fn with_key_bytes<R>(&self, f: impl FnOnce(&[u8], &Tag) -> R) -> Result<R, MemoryError> {
        let bytes = self.0.as_slice()?;
        Ok(f(bytes, self.0.tag()))
    }
}

impl PrivateKeyMemory {
    /// Run `f` over the private key bytes without handing out a reference
    /// that can outlive the call.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UseAfterDispose`] once disposed.
    pub fn with_key_bytes<R>(
        &self,
        f: impl FnOnce(PrivateKeyBytes<'_>, &Tag) -> R,
    ) -> Result<R, MemoryError> {
        let bytes = self.0.as_slice()?;
        Ok(f(PrivateKeyBytes { bytes }, self.0.tag()))
    }
}

/// Private key bytes lent to a [`PrivateKeyMemory::with_key_bytes`]
/// continuation. Masked in debug output.
pub struct PrivateKeyBytes<'a> {
    bytes: &'a [u8],
}

impl<'a> PrivateKeyBytes<'a> {
    /// Expose the raw bytes for a cryptographic operation.
    #[must_use]
    pub const fn expose(&self) -> &'a [u8] {
        self.bytes
    }

    /// Byte length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if there are no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for PrivateKeyBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyBytes(***)")
    }
}

impl Signature {
    /// Algorithm recorded in the tag, if any.
    #[must_use]
    pub fn algorithm(&self) -> Option<CryptoAlgorithm> {
        self.0.tag().get::<CryptoAlgorithm>().copied()
    }
}

impl PartialEq for PublicKeyMemory {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl PartialEq for PrivateKeyMemory {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Signatures compare by content *and* algorithm: identical bytes from two
/// different schemes are different signatures.
impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm() == other.algorithm() && self.0 == other.0
    }
}

impl fmt::Debug for PublicKeyMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disposed() {
            f.write_str("PublicKeyMemory(disposed)")
        } else {
            write!(f, "PublicKeyMemory({:?}, {} bytes)", self.tag(), self.len())
        }
    }
}

impl fmt::Debug for PrivateKeyMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyMemory(***)")
    }
}

/// Algorithm, length, and the first few bytes only.
impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(bytes) = self.as_slice() else {
            return f.write_str("Signature(disposed)");
        };
        let algorithm = self.algorithm().map_or("unknown", |a| a.as_str());
        let shown = bytes.get(..PREVIEW_LEN).unwrap_or(bytes);
        let ellipsis = if bytes.len() > PREVIEW_LEN { "…" } else { "" };
        write!(
            f,
            "Signature({algorithm}, {} bytes, {}{ellipsis})",
            bytes.len(),
            HEXLOWER.encode(shown)
        )
    }
}
