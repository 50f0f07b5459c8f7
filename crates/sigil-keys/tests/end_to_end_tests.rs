#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! End-to-end: global registry, pooled key memory, sign, verify, dispose.

use std::sync::{Arc, Once};
use std::thread;

use sigil_keys::{
    FunctionContext, FunctionRegistry, FunctionTable, KeyError, KeyFactory,
};
use sigil_memory::{
    tags, BufferAllocator, CryptoAlgorithm, OwnedBuffer, PoolConfig, PrivateKeyBytes,
    PrivateKeyMemory, PublicKeyMemory, Purpose, SlabPool,
};

/// Fixed output of the stub signer.
const PATTERN: [u8; 48] = [0xC3; 48];

static INIT: Once = Once::new();

fn stub_signer(
    _key: PrivateKeyBytes<'_>,
    _data: &[u8],
    allocator: &dyn BufferAllocator,
    _ctx: Option<&FunctionContext>,
) -> Result<OwnedBuffer, KeyError> {
    let mut out = allocator.rent(PATTERN.len())?;
    out.as_mut_slice().copy_from_slice(&PATTERN);
    Ok(out)
}

fn stub_verifier(
    _key: &[u8],
    _data: &[u8],
    signature: &[u8],
    _ctx: Option<&FunctionContext>,
) -> Result<bool, KeyError> {
    Ok(signature == PATTERN)
}

fn global() -> &'static FunctionRegistry {
    INIT.call_once(|| {
        FunctionRegistry::global()
            .initialize(
                FunctionTable::new()
                    .with_signer(CryptoAlgorithm::Secp256k1, Purpose::Signing, stub_signer)
                    .with_verifier(
                        CryptoAlgorithm::Secp256k1,
                        Purpose::Verification,
                        stub_verifier,
                    ),
            )
            .expect("global registry is initialized once per test binary");
    });
    FunctionRegistry::global()
}

fn pool() -> Arc<SlabPool> {
    Arc::new(
        SlabPool::with_config(PoolConfig {
            lock_memory: false,
            ..PoolConfig::default()
        })
        .expect("pool"),
    )
}

#[test]
fn stub_signature_round_trip_and_zeroing() {
    let registry = global();
    let pool = pool();
    let factory = KeyFactory::new(registry);

    let private = factory
        .create_private_key(
            "secp-1",
            PrivateKeyMemory::copy_from(pool.as_ref(), &[0x11; 32], tags::secp256k1_private_key())
                .expect("copy"),
        )
        .expect("bind");
    let public = factory
        .create_public_key(
            "secp-1",
            PublicKeyMemory::copy_from(pool.as_ref(), &[0x02; 33], tags::secp256k1_public_key())
                .expect("copy"),
        )
        .expect("bind");

    let mut signature = private.sign(b"payload", pool.as_ref()).expect("sign");
    assert_eq!(signature.as_slice().expect("live"), PATTERN);
    assert!(public.verify(b"payload", &signature).expect("verify"));

    signature.dispose();
    assert!(signature.as_slice().is_err());
    let reused = pool.rent(PATTERN.len()).expect("rent");
    assert!(reused.as_slice().iter().all(|&b| b == 0));
}

#[test]
fn global_registry_rejects_second_initialize() {
    let registry = global();
    assert!(registry.is_initialized());
    assert_eq!(
        registry.initialize(FunctionTable::new()),
        Err(KeyError::AlreadyInitialized)
    );
}

#[test]
fn global_factory_resolves_from_many_threads() {
    global();
    let pool = pool();
    thread::scope(|scope| {
        for i in 0..8u8 {
            let pool = Arc::clone(&pool);
            scope.spawn(move || {
                let key = KeyFactory::global()
                    .create_private_key(
                        format!("k{i}"),
                        PrivateKeyMemory::copy_from(
                            pool.as_ref(),
                            &[i; 32],
                            tags::secp256k1_private_key(),
                        )
                        .expect("copy"),
                    )
                    .expect("bind");
                for _ in 0..50 {
                    let sig = key.sign(&[i], pool.as_ref()).expect("sign");
                    assert_eq!(sig.len(), PATTERN.len());
                }
            });
        }
    });
    assert_eq!(pool.statistics().expect("stats").active_rentals, 0);
}

#[cfg(feature = "ring")]
#[test]
fn ring_backend_in_isolated_registry() {
    let registry = FunctionRegistry::new();
    registry
        .initialize(sigil_keys::register_ring_functions(FunctionTable::new()))
        .expect("initialize");
    let pool = pool();
    let (private, public) = sigil_keys::generate_ed25519(pool.as_ref()).expect("keygen");
    let factory = KeyFactory::new(&registry);
    let private = factory.create_private_key("ed", private).expect("bind");
    let public = factory.create_public_key("ed", public).expect("bind");
    let sig = private.sign(b"pooled", pool.as_ref()).expect("sign");
    assert!(public.verify(b"pooled", &sig).expect("verify"));
}
