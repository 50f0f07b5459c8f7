//! Verify that a returned segment holds no trace of its previous contents.
//!
//! The free stack is LIFO, so renting the same size again right after a
//! return hands back the very same segment. That lets the tests inspect the
//! bytes through a live lease instead of reading freed memory.

use sigil_memory::{
    tags, BufferAllocator, PoolConfig, PrivateKeyMemory, SensitiveMemory, SlabPool, Tag,
};

/// Sentinel pattern used to verify zeroization.
const SENTINEL: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

fn pool() -> SlabPool {
    SlabPool::with_config(PoolConfig {
        lock_memory: false,
        ..PoolConfig::default()
    })
    .expect("pool should build")
}

fn sentinel(len: usize) -> Vec<u8> {
    SENTINEL.iter().copied().cycle().take(len).collect()
}

#[test]
fn released_lease_is_zero_when_rented_again() {
    let pool = pool();
    let mut lease = pool.rent(96).expect("rent");
    lease.as_mut_slice().copy_from_slice(&sentinel(96));
    let addr = lease.as_slice().as_ptr();
    lease.release().expect("release");

    let again = pool.rent(96).expect("rent");
    assert_eq!(again.as_slice().as_ptr(), addr, "LIFO reuse of the segment");
    assert!(again.as_slice().iter().all(|&b| b == 0));
}

#[test]
fn dropped_lease_is_zero_when_rented_again() {
    let pool = pool();
    {
        let mut lease = pool.rent(32).expect("rent");
        lease.as_mut_slice().copy_from_slice(&sentinel(32));
    }
    let again = pool.rent(32).expect("rent");
    assert!(again.as_slice().iter().all(|&b| b == 0));
}

#[test]
fn disposed_private_key_leaves_zeroed_segment() {
    let pool = pool();
    let mut key =
        PrivateKeyMemory::copy_from(&pool, &sentinel(32), tags::ed25519_private_key())
            .expect("copy");
    key.dispose();

    let lease = pool.rent(32).expect("rent");
    let reused = SensitiveMemory::from_owner(Box::new(lease), Tag::empty()).expect("wrap");
    assert!(reused.as_slice().expect("live").iter().all(|&b| b == 0));
}

#[test]
fn trim_then_rent_yields_zeroed_memory() {
    let pool = pool();
    {
        let mut lease = pool.rent(200).expect("rent");
        lease.as_mut_slice().copy_from_slice(&sentinel(200));
    }
    assert_eq!(pool.trim_excess().expect("trim"), 1);
    let fresh = BufferAllocator::rent(&pool, 200).expect("rent");
    assert!(fresh.as_slice().iter().all(|&b| b == 0));
}
