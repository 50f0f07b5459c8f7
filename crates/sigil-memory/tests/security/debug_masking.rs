//! Debug output of key-bearing types must never contain their bytes.

use sigil_memory::{
    tags, CryptoAlgorithm, HeapAllocator, PoolConfig, PrivateKeyMemory, PublicKeyMemory,
    SensitiveMemory, Signature, SlabPool,
};

const SECRET: [u8; 32] = [0x5A; 32];

#[test]
fn private_key_debug_is_fully_masked() {
    let key = PrivateKeyMemory::copy_from(&HeapAllocator, &SECRET, tags::ed25519_private_key())
        .expect("copy");
    let debug = format!("{key:?}");
    assert_eq!(debug, "PrivateKeyMemory(***)");
    assert!(!debug.contains("5a"));
}

#[test]
fn sensitive_memory_debug_is_masked() {
    let mem = SensitiveMemory::copy_from(&HeapAllocator, &SECRET, tags::x25519_private_key())
        .expect("copy");
    assert_eq!(format!("{mem:?}"), "SensitiveMemory(***)");
    assert_eq!(format!("{:?}", mem.as_memory().expect("live")), "MemoryView<32>(***)");
}

#[test]
fn public_key_debug_shows_tag_and_length_only() {
    let key = PublicKeyMemory::copy_from(&HeapAllocator, &SECRET, tags::ed25519_public_key())
        .expect("copy");
    let debug = format!("{key:?}");
    assert!(debug.contains("32 bytes"));
    assert!(!debug.contains("5a5a"));
}

#[test]
fn signature_debug_shows_four_bytes() {
    let sig = Signature::copy_from(&HeapAllocator, &SECRET, tags::signature(CryptoAlgorithm::P256))
        .expect("copy");
    insta::assert_snapshot!(format!("{sig:?}"), @"Signature(p256, 32 bytes, 5a5a5a5a…)");
}

#[test]
fn lease_debug_is_masked() {
    let pool = SlabPool::with_config(PoolConfig {
        lock_memory: false,
        ..PoolConfig::default()
    })
    .expect("pool");
    let mut lease = pool.rent(16).expect("rent");
    lease.as_mut_slice().fill(0x5A);
    let debug = format!("{lease:?}");
    assert!(debug.ends_with("len: 16, bytes: *** }"));
    assert!(!debug.contains("5a"));
}
