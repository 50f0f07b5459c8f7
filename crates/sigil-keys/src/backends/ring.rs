//! Signing and verification functions backed by `ring`.
//!
//! This module provides:
//! - [`register_ring_functions`]: install the functions below into a table
//! - Ed25519 signing from a 32-byte seed and Ed25519 verification
//! - ECDSA P-256 / SHA-256 verification over uncompressed SEC1 public keys,
//!   fixed-width (`r || s`) by default, DER with the [`ASN1`] qualifier
//! - [`generate_ed25519`]: a fresh tagged key pair from OS randomness
//!
//! A signature that does not verify is reported as `Ok(false)`. `ring` does
//! not tell a malformed key apart from a wrong signature, so both land there;
//! only a key of the wrong length is an error.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::signature::{self, Ed25519KeyPair, KeyPair, VerificationAlgorithm};
use sigil_memory::{
    tags, BufferAllocator, CryptoAlgorithm, OwnedBuffer, PrivateKeyBytes, PrivateKeyMemory,
    PublicKeyMemory, Purpose, Qualifier,
};
use zeroize::Zeroizing;

use crate::error::KeyError;
use crate::registry::{FunctionContext, FunctionTable};

/// Ed25519 seed (private key) length in bytes.
pub const ED25519_SEED_LEN: usize = 32;

/// Ed25519 public key length in bytes.
pub const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 signature length in bytes.
pub const ED25519_SIGNATURE_LEN: usize = 64;

/// Uncompressed SEC1 P-256 public key length in bytes.
pub const P256_PUBLIC_KEY_LEN: usize = 65;

/// Qualifier selecting DER-encoded ECDSA signatures.
pub const ASN1: Qualifier = Qualifier::new("asn1");

/// Add every `ring` function to `table`.
#[must_use]
pub fn register_ring_functions(table: FunctionTable) -> FunctionTable {
    table
        .with_signer(CryptoAlgorithm::Ed25519, Purpose::Signing, ed25519_sign)
        .with_verifier(
            CryptoAlgorithm::Ed25519,
            Purpose::Verification,
            ed25519_verify,
        )
        .with_verifier(
            CryptoAlgorithm::P256,
            Purpose::Verification,
            p256_verify_fixed,
        )
        .with_qualified_verifier(
            CryptoAlgorithm::P256,
            Purpose::Verification,
            ASN1,
            p256_verify_asn1,
        )
}

fn check_len(what: &str, bytes: &[u8], expected: usize) -> Result<(), KeyError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(KeyError::ArgumentInvalid(format!(
            "{what} must be {expected} bytes, got {}",
            bytes.len()
        )))
    }
}

fn ed25519_sign(
    seed: PrivateKeyBytes<'_>,
    data: &[u8],
    allocator: &dyn BufferAllocator,
    _context: Option<&FunctionContext>,
) -> Result<OwnedBuffer, KeyError> {
    check_len("Ed25519 seed", seed.expose(), ED25519_SEED_LEN)?;
    let key_pair = Ed25519KeyPair::from_seed_unchecked(seed.expose())
        .map_err(|e| KeyError::Signing(format!("Ed25519 key rejected: {e}")))?;
    let sig = key_pair.sign(data);
    let mut out = allocator.rent(ED25519_SIGNATURE_LEN)?;
    out.as_mut_slice().copy_from_slice(sig.as_ref());
    Ok(out)
}

fn verify_with(
    algorithm: &'static dyn VerificationAlgorithm,
    public_key: &[u8],
    data: &[u8],
    sig: &[u8],
) -> bool {
    signature::UnparsedPublicKey::new(algorithm, public_key)
        .verify(data, sig)
        .is_ok()
}

fn ed25519_verify(
    public_key: &[u8],
    data: &[u8],
    sig: &[u8],
    _context: Option<&FunctionContext>,
) -> Result<bool, KeyError> {
    check_len("Ed25519 public key", public_key, ED25519_PUBLIC_KEY_LEN)?;
    Ok(verify_with(&signature::ED25519, public_key, data, sig))
}

fn p256_verify_fixed(
    public_key: &[u8],
    data: &[u8],
    sig: &[u8],
    _context: Option<&FunctionContext>,
) -> Result<bool, KeyError> {
    check_len("P-256 public key", public_key, P256_PUBLIC_KEY_LEN)?;
    Ok(verify_with(
        &signature::ECDSA_P256_SHA256_FIXED,
        public_key,
        data,
        sig,
    ))
}

fn p256_verify_asn1(
    public_key: &[u8],
    data: &[u8],
    sig: &[u8],
    _context: Option<&FunctionContext>,
) -> Result<bool, KeyError> {
    check_len("P-256 public key", public_key, P256_PUBLIC_KEY_LEN)?;
    Ok(verify_with(
        &signature::ECDSA_P256_SHA256_ASN1,
        public_key,
        data,
        sig,
    ))
}

/// Generate an Ed25519 key pair into buffers rented from `allocator`.
///
/// The private half holds the 32-byte seed, tagged
/// [`tags::ed25519_private_key`]; the public half is tagged
/// [`tags::ed25519_public_key`].
///
/// # Errors
///
/// Returns [`KeyError::Signing`] if `ring` rejects the seed, or
/// [`KeyError::Memory`] if the allocator fails.
pub fn generate_ed25519(
    allocator: &dyn BufferAllocator,
) -> Result<(PrivateKeyMemory, PublicKeyMemory), KeyError> {
    let mut seed = Zeroizing::new([0u8; ED25519_SEED_LEN]);
    OsRng.fill_bytes(&mut *seed);

    let key_pair = Ed25519KeyPair::from_seed_unchecked(&*seed)
        .map_err(|e| KeyError::Signing(format!("Ed25519 key generation failed: {e}")))?;

    let private = PrivateKeyMemory::copy_from(allocator, &*seed, tags::ed25519_private_key())?;
    let public = PublicKeyMemory::copy_from(
        allocator,
        key_pair.public_key().as_ref(),
        tags::ed25519_public_key(),
    )?;
    Ok((private, public))
}

#[cfg(test)]
mod tests {
    use ring::rand::SystemRandom;
    use ring::signature::{
        EcdsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING, ECDSA_P256_SHA256_FIXED_SIGNING,
    };
    use sigil_memory::{HeapAllocator, Signature};

    use super::*;
    use crate::factory::{BindOptions, KeyFactory};
    use crate::registry::FunctionRegistry;

    fn registry() -> FunctionRegistry {
        let registry = FunctionRegistry::new();
        registry
            .initialize(register_ring_functions(FunctionTable::new()))
            .expect("initialize");
        registry
    }

    #[test]
    fn ed25519_roundtrip() {
        let registry = registry();
        let factory = KeyFactory::new(&registry);
        let (private, public) = generate_ed25519(&HeapAllocator).expect("keygen");
        assert_eq!(private.len(), ED25519_SEED_LEN);
        assert_eq!(public.len(), ED25519_PUBLIC_KEY_LEN);

        let private = factory.create_private_key("k", private).expect("bind");
        let public = factory.create_public_key("k", public).expect("bind");

        let sig = private.sign(b"hello", &HeapAllocator).expect("sign");
        assert_eq!(sig.len(), ED25519_SIGNATURE_LEN);
        assert!(public.verify(b"hello", &sig).expect("verify"));
        assert!(!public.verify(b"hellO", &sig).expect("verify"));
    }

    #[test]
    fn ed25519_rejects_foreign_key() {
        let registry = registry();
        let factory = KeyFactory::new(&registry);
        let (private, _) = generate_ed25519(&HeapAllocator).expect("keygen");
        let (_, other_public) = generate_ed25519(&HeapAllocator).expect("keygen");
        let private = factory.create_private_key("a", private).expect("bind");
        let other = factory.create_public_key("b", other_public).expect("bind");
        let sig = private.sign(b"msg", &HeapAllocator).expect("sign");
        assert!(!other.verify(b"msg", &sig).expect("verify"));
    }

    #[test]
    fn ed25519_signing_is_deterministic() {
        let registry = registry();
        let (private, _) = generate_ed25519(&HeapAllocator).expect("keygen");
        let key = KeyFactory::new(&registry)
            .create_private_key("k", private)
            .expect("bind");
        let a = key.sign(b"same", &HeapAllocator).expect("sign");
        let b = key.sign(b"same", &HeapAllocator).expect("sign");
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_seed_length_is_invalid() {
        let registry = registry();
        let memory =
            PrivateKeyMemory::copy_from(&HeapAllocator, &[1; 16], tags::ed25519_private_key())
                .expect("copy");
        let key = KeyFactory::new(&registry)
            .create_private_key("k", memory)
            .expect("bind");
        assert!(matches!(
            key.sign(b"msg", &HeapAllocator),
            Err(KeyError::ArgumentInvalid(_))
        ));
    }

    #[test]
    fn p256_fixed_and_asn1_verification() {
        let rng = SystemRandom::new();
        let registry = registry();
        let factory = KeyFactory::new(&registry);

        let fixed_doc =
            EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng).expect("pkcs8");
        let fixed_kp =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, fixed_doc.as_ref(), &rng)
                .expect("key pair");
        let fixed_sig = fixed_kp.sign(&rng, b"payload").expect("sign");

        let public = factory
            .create_public_key(
                "p256",
                PublicKeyMemory::copy_from(
                    &HeapAllocator,
                    fixed_kp.public_key().as_ref(),
                    tags::p256_public_key(),
                )
                .expect("copy"),
            )
            .expect("bind");
        let sig = Signature::copy_from(
            &HeapAllocator,
            fixed_sig.as_ref(),
            tags::signature(CryptoAlgorithm::P256),
        )
        .expect("copy");
        assert!(public.verify(b"payload", &sig).expect("verify"));
        assert!(!public.verify(b"other", &sig).expect("verify"));

        let asn1_kp =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, fixed_doc.as_ref(), &rng)
                .expect("key pair");
        let der_sig = asn1_kp.sign(&rng, b"payload").expect("sign");
        let der_public = factory
            .create_public_key_with(
                "p256-der",
                PublicKeyMemory::copy_from(
                    &HeapAllocator,
                    asn1_kp.public_key().as_ref(),
                    tags::p256_public_key(),
                )
                .expect("copy"),
                BindOptions::new().qualifier(ASN1),
            )
            .expect("bind");
        let der = Signature::copy_from(
            &HeapAllocator,
            der_sig.as_ref(),
            tags::signature(CryptoAlgorithm::P256),
        )
        .expect("copy");
        assert!(der_public.verify(b"payload", &der).expect("verify"));
        // A DER signature is not a fixed-width one.
        assert!(!public.verify(b"payload", &der).expect("verify"));
    }

    #[test]
    fn p256_wrong_key_length_is_invalid() {
        assert!(matches!(
            p256_verify_fixed(&[4; 33], b"", &[0; 64], None),
            Err(KeyError::ArgumentInvalid(_))
        ));
    }

    #[test]
    fn p256_signing_is_not_registered() {
        let registry = registry();
        let memory =
            PrivateKeyMemory::copy_from(&HeapAllocator, &[1; 32], tags::p256_private_key())
                .expect("copy");
        assert!(matches!(
            KeyFactory::new(&registry).create_private_key("k", memory),
            Err(KeyError::NotFound { .. })
        ));
    }
}
