//! Ready-made tags for common key and signature formats.

use crate::facets::{BufferKind, CryptoAlgorithm, EncodingScheme, MaterialSemantics, Purpose};
use crate::tag::Tag;

fn key_tag(
    algorithm: CryptoAlgorithm,
    purpose: Purpose,
    kind: BufferKind,
    encoding: EncodingScheme,
) -> Tag {
    Tag::builder()
        .with(algorithm)
        .with(purpose)
        .with(kind)
        .with(encoding)
        .with(MaterialSemantics::Direct)
        .build()
}

/// Raw 32-byte Ed25519 public key used for verification.
#[must_use]
pub fn ed25519_public_key() -> Tag {
    key_tag(
        CryptoAlgorithm::Ed25519,
        Purpose::Verification,
        BufferKind::PublicKey,
        EncodingScheme::Raw,
    )
}

/// Raw 32-byte Ed25519 seed used for signing.
#[must_use]
pub fn ed25519_private_key() -> Tag {
    key_tag(
        CryptoAlgorithm::Ed25519,
        Purpose::Signing,
        BufferKind::PrivateKey,
        EncodingScheme::Raw,
    )
}

/// Uncompressed P-256 point used for verification.
#[must_use]
pub fn p256_public_key() -> Tag {
    key_tag(
        CryptoAlgorithm::P256,
        Purpose::Verification,
        BufferKind::PublicKey,
        EncodingScheme::EcUncompressed,
    )
}

/// Raw 32-byte P-256 scalar used for signing.
#[must_use]
pub fn p256_private_key() -> Tag {
    key_tag(
        CryptoAlgorithm::P256,
        Purpose::Signing,
        BufferKind::PrivateKey,
        EncodingScheme::Raw,
    )
}

/// Compressed secp256k1 point used for verification.
#[must_use]
pub fn secp256k1_public_key() -> Tag {
    key_tag(
        CryptoAlgorithm::Secp256k1,
        Purpose::Verification,
        BufferKind::PublicKey,
        EncodingScheme::EcCompressed,
    )
}

/// Raw 32-byte secp256k1 scalar used for signing.
#[must_use]
pub fn secp256k1_private_key() -> Tag {
    key_tag(
        CryptoAlgorithm::Secp256k1,
        Purpose::Signing,
        BufferKind::PrivateKey,
        EncodingScheme::Raw,
    )
}

/// Raw X25519 public key used for key agreement.
#[must_use]
pub fn x25519_public_key() -> Tag {
    key_tag(
        CryptoAlgorithm::X25519,
        Purpose::Exchange,
        BufferKind::PublicKey,
        EncodingScheme::Raw,
    )
}

/// Raw X25519 private key used for key agreement.
#[must_use]
pub fn x25519_private_key() -> Tag {
    key_tag(
        CryptoAlgorithm::X25519,
        Purpose::Exchange,
        BufferKind::PrivateKey,
        EncodingScheme::Raw,
    )
}

/// Tag for a signature produced with `algorithm`.
#[must_use]
pub fn signature(algorithm: CryptoAlgorithm) -> Tag {
    Tag::builder()
        .with(algorithm)
        .with(BufferKind::Signature)
        .build()
}
