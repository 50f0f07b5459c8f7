#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Many threads renting and returning against one pool.

use std::sync::Arc;
use std::thread;

use sigil_memory::{tags, PoolConfig, PrivateKeyMemory, SlabPool};

const THREADS: usize = 8;
const ITERATIONS: usize = 500;
const SIZES: [usize; 3] = [32, 64, 100];

fn pool() -> Arc<SlabPool> {
    Arc::new(
        SlabPool::with_config(PoolConfig {
            lock_memory: false,
            ..PoolConfig::default()
        })
        .expect("pool should build"),
    )
}

/// No thread ever observes another thread's bytes in its own segment.
#[test]
fn concurrent_leases_never_alias() {
    let pool = pool();
    thread::scope(|scope| {
        for t in 0..THREADS {
            let pool = Arc::clone(&pool);
            scope.spawn(move || {
                let marker = u8::try_from(t + 1).unwrap();
                for i in 0..ITERATIONS {
                    let size = SIZES[i % SIZES.len()];
                    let mut lease = pool.rent(size).expect("rent");
                    assert!(lease.as_slice().iter().all(|&b| b == 0), "rented dirty");
                    lease.as_mut_slice().fill(marker);
                    thread::yield_now();
                    assert!(lease.as_slice().iter().all(|&b| b == marker), "aliased");
                    lease.release().expect("release");
                }
            });
        }
    });

    let stats = pool.statistics().expect("stats");
    assert_eq!(stats.active_rentals, 0);
    assert_eq!(stats.rents, (THREADS * ITERATIONS) as u64);
    assert_eq!(stats.returns, stats.rents);
}

/// Keys built and dropped on many threads all find their way back.
#[test]
fn concurrent_key_lifecycles_balance() {
    let pool = pool();
    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..ITERATIONS / 5 {
                    let key = PrivateKeyMemory::copy_from(
                        pool.as_ref(),
                        &[0x42; 32],
                        tags::ed25519_private_key(),
                    )
                    .expect("copy");
                    assert_eq!(key.len(), 32);
                }
            });
        }
    });
    assert_eq!(pool.statistics().expect("stats").active_rentals, 0);
}

/// Disposing while other threads hold leases never panics any thread.
#[test]
fn dispose_races_with_outstanding_leases() {
    let pool = pool();
    let leases: Vec<_> = (0..THREADS).map(|_| pool.rent(48).expect("rent")).collect();
    pool.dispose();
    thread::scope(|scope| {
        for lease in leases {
            scope.spawn(move || {
                assert!(lease.release().is_err());
            });
        }
    });
    assert!(pool.is_disposed());
}
