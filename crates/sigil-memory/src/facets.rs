//! Well-known tag facets.
//!
//! Each facet is a closed enumeration so registry lookups stay exhaustive
//! and deterministic. A [`Tag`](crate::tag::Tag) holds at most one value per
//! facet type.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Cryptographic algorithm the material belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CryptoAlgorithm {
    /// Edwards-curve signatures over Curve25519.
    Ed25519,
    /// Diffie-Hellman over Curve25519.
    X25519,
    /// NIST P-256 (secp256r1).
    P256,
    /// NIST P-384 (secp384r1).
    P384,
    /// NIST P-521 (secp521r1).
    P521,
    /// Koblitz curve secp256k1.
    Secp256k1,
    /// RSA with a 2048-bit modulus.
    Rsa2048,
    /// RSA with a 4096-bit modulus.
    Rsa4096,
    /// BLS12-381 with keys in G1.
    Bls12381G1,
    /// BLS12-381 with keys in G2.
    Bls12381G2,
}

impl CryptoAlgorithm {
    /// Short lowercase name, stable across releases.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::X25519 => "x25519",
            Self::P256 => "p256",
            Self::P384 => "p384",
            Self::P521 => "p521",
            Self::Secp256k1 => "secp256k1",
            Self::Rsa2048 => "rsa2048",
            Self::Rsa4096 => "rsa4096",
            Self::Bls12381G1 => "bls12381g1",
            Self::Bls12381G2 => "bls12381g2",
        }
    }
}

impl fmt::Display for CryptoAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intended cryptographic use of a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Purpose {
    /// Produces signatures.
    Signing,
    /// Checks signatures.
    Verification,
    /// Encrypts or decrypts data.
    Encryption,
    /// Key agreement.
    Exchange,
    /// Derives further keys.
    Derivation,
    /// Wraps other keys.
    Wrapping,
}

impl Purpose {
    /// Short lowercase name, stable across releases.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Signing => "signing",
            Self::Verification => "verification",
            Self::Encryption => "encryption",
            Self::Exchange => "exchange",
            Self::Derivation => "derivation",
            Self::Wrapping => "wrapping",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the bytes of a buffer are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingScheme {
    /// Algorithm-native raw bytes (seeds, fixed-width signatures).
    Raw,
    /// Compressed elliptic-curve point.
    EcCompressed,
    /// Uncompressed elliptic-curve point (`0x04 || X || Y`).
    EcUncompressed,
    /// ASN.1 DER.
    Der,
    /// PKCS#8 private key document.
    Pkcs8,
}

/// Whether the bytes are the key itself or a reference to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialSemantics {
    /// The buffer holds the key material.
    Direct,
    /// The buffer holds a handle to hardware-held material (HSM, TPM, enclave).
    HardwareHandle,
    /// The buffer holds a reference to remotely held material (KMS).
    RemoteReference,
}

/// Kind of value a buffer carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferKind {
    /// Public key bytes.
    PublicKey,
    /// Private key bytes.
    PrivateKey,
    /// Signature bytes.
    Signature,
    /// Hash output.
    Digest,
    /// Nonce or IV.
    Nonce,
}

/// Free-form third dispatch axis, e.g. a signature format.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Qualifier(Cow<'static, str>);

impl Qualifier {
    /// Qualifier from a static string.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Qualifier from an owned string.
    #[must_use]
    pub fn owned(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The qualifier's name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
