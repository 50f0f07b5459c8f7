//! Verify that the default pool `mlock`s its slabs.
//!
//! mlock can legitimately fail under a small `RLIMIT_MEMLOCK` (CI,
//! containers), so lock status is reported rather than asserted; when it
//! does succeed the kernel's accounting must agree.

use std::sync::{Mutex, MutexGuard, PoisonError};

use sigil_memory::{PoolConfig, SlabPool};

/// Serializes the tests that lock pages; VmLck is process-wide.
static MLOCK: Mutex<()> = Mutex::new(());

fn exclusive() -> MutexGuard<'static, ()> {
    MLOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[test]
fn default_pool_locks_memory() {
    let _guard = exclusive();
    assert!(PoolConfig::default().lock_memory);
    let pool = SlabPool::new().expect("default pool should build");
    let mut lease = pool.rent(64).expect("rent");
    lease.as_mut_slice().fill(0xAA);
    eprintln!("slab mlock status: {}", lease.is_locked());

    lease.release().expect("release");
    let again = pool.rent(64).expect("rent");
    assert!(again.as_slice().iter().all(|&b| b == 0));
}

#[test]
fn leases_of_one_slab_share_lock_status() {
    let _guard = exclusive();
    let pool = SlabPool::new().expect("default pool should build");
    let a = pool.rent(48).expect("rent");
    let b = pool.rent(48).expect("rent");
    assert_eq!(a.is_locked(), b.is_locked());
}

#[test]
fn unlocked_config_never_locks() {
    let pool = SlabPool::with_config(PoolConfig {
        lock_memory: false,
        ..PoolConfig::default()
    })
    .expect("pool should build");
    assert!(!pool.rent(32).expect("rent").is_locked());
}

#[cfg(target_os = "linux")]
#[test]
fn locked_slab_is_counted_in_vmlck() {
    let _guard = exclusive();
    let vmlck_before = read_vmlck_kb();

    // Slabs for 64 KiB segments span many pages, well above VmLck granularity.
    let pool = SlabPool::with_strategy(&PoolConfig::default(), |_: usize| 1)
        .expect("pool should build");
    let lease = pool.rent(65536).expect("rent");

    if lease.is_locked() {
        let vmlck_after = read_vmlck_kb();
        assert!(
            vmlck_after > vmlck_before,
            "VmLck did not increase after mlock: before={vmlck_before}KB, after={vmlck_after}KB"
        );
        drop(lease);
        pool.trim_excess().expect("trim");
        assert!(read_vmlck_kb() < vmlck_after, "trimmed slab stayed locked");
    } else {
        eprintln!("mlock failed (likely insufficient quota): skipping VmLck check");
    }
}

#[cfg(target_os = "linux")]
fn read_vmlck_kb() -> u64 {
    let status =
        std::fs::read_to_string("/proc/self/status").expect("failed to read /proc/self/status");
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmLck:"))
        .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse().ok())
        .unwrap_or(0)
}
