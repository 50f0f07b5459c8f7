//! `mlock` for slab arenas.
//!
//! Arenas hold every live key and signature, so they are pinned out of swap
//! when the platform allows it. A refusal (quota, privileges) leaves the
//! arena usable and is logged once per process.

use std::sync::Once;

/// Pin `len` bytes at `base`. Returns whether the pages are now locked.
pub(super) fn pin(base: *const u8, len: usize) -> bool {
    if len == 0 {
        return false;
    }
    let pinned = sys::mlock(base, len);
    if !pinned {
        static WARNED: Once = Once::new();
        WARNED.call_once(|| {
            tracing::warn!(
                len,
                "slab arena could not be mlock'd and may be swapped; raise RLIMIT_MEMLOCK"
            );
        });
    }
    pinned
}

/// Undo a successful [`pin`] of the same range.
pub(super) fn unpin(base: *const u8, len: usize) {
    if len > 0 {
        sys::munlock(base, len);
    }
}

#[cfg(unix)]
mod sys {
    pub(super) fn mlock(base: *const u8, len: usize) -> bool {
        // SAFETY: mlock only inspects the range; an unmapped range is ENOMEM.
        unsafe { libc::mlock(base.cast(), len) == 0 }
    }

    pub(super) fn munlock(base: *const u8, len: usize) {
        // SAFETY: the range was locked by `mlock` and is still mapped.
        unsafe {
            libc::munlock(base.cast(), len);
        }
    }
}

#[cfg(not(unix))]
mod sys {
    pub(super) const fn mlock(_base: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) const fn munlock(_base: *const u8, _len: usize) {}
}
