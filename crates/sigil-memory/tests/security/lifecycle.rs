//! Single-release and use-after-dispose behavior for every buffer kind.

use sigil_memory::{
    tags, CryptoAlgorithm, HeapAllocator, MemoryError, PoolConfig, PrivateKeyMemory,
    PublicKeyMemory, SensitiveBuffer, SensitiveMemory, Signature, SlabPool, Tag,
};

fn pool() -> SlabPool {
    SlabPool::with_config(PoolConfig {
        lock_memory: false,
        ..PoolConfig::default()
    })
    .expect("pool should build")
}

fn assert_single_release(mut buffer: impl SensitiveBuffer, pool: &SlabPool) {
    assert!(!buffer.is_disposed());
    buffer.dispose();
    buffer.dispose();
    assert!(buffer.is_disposed());
    assert_eq!(
        buffer.as_slice(),
        Err(MemoryError::UseAfterDispose("sensitive memory"))
    );
    let stats = pool.statistics().expect("stats");
    assert_eq!(stats.active_rentals, 0);
    assert_eq!(stats.rents, stats.returns);
}

#[test]
fn sensitive_memory_releases_once() {
    let pool = pool();
    let mem = SensitiveMemory::copy_from(&pool, &[1; 24], Tag::empty()).expect("copy");
    assert_single_release(mem, &pool);
}

#[test]
fn public_key_releases_once() {
    let pool = pool();
    let key = PublicKeyMemory::copy_from(&pool, &[2; 32], tags::ed25519_public_key())
        .expect("copy");
    assert_single_release(key, &pool);
}

#[test]
fn private_key_releases_once() {
    let pool = pool();
    let key = PrivateKeyMemory::copy_from(&pool, &[3; 32], tags::p256_private_key())
        .expect("copy");
    assert_single_release(key, &pool);
}

#[test]
fn signature_releases_once() {
    let pool = pool();
    let sig = Signature::copy_from(&pool, &[4; 64], tags::signature(CryptoAlgorithm::Ed25519))
        .expect("copy");
    assert_single_release(sig, &pool);
}

#[test]
fn drop_releases_to_pool() {
    let pool = pool();
    {
        let _key = PublicKeyMemory::copy_from(&pool, &[5; 65], tags::p256_public_key())
            .expect("copy");
        assert_eq!(pool.statistics().expect("stats").active_rentals, 1);
    }
    assert_eq!(pool.statistics().expect("stats").active_rentals, 0);
}

#[test]
fn dispose_after_pool_dispose_does_not_panic() {
    let pool = pool();
    let mut key = PrivateKeyMemory::copy_from(&pool, &[6; 32], tags::ed25519_private_key())
        .expect("copy");
    pool.dispose();
    key.dispose();
    assert!(key.is_disposed());
}

#[test]
fn continuations_fail_after_dispose() {
    let mut public = PublicKeyMemory::copy_from(&HeapAllocator, &[7; 32], Tag::empty())
        .expect("copy");
    let mut private = PrivateKeyMemory::copy_from(&HeapAllocator, &[8; 32], Tag::empty())
        .expect("copy");
    public.dispose();
    private.dispose();
    assert!(public.with_key_bytes(|_, _| ()).is_err());
    assert!(private.with_key_bytes(|_, _| ()).is_err());
}

#[test]
fn disposed_pool_refuses_rent() {
    let pool = pool();
    pool.dispose();
    assert!(matches!(
        SensitiveMemory::copy_from(&pool, &[1], Tag::empty()),
        Err(MemoryError::UseAfterDispose(_))
    ));
}
