//! Buffer-owner lifecycle object for one rented segment.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroize;

use super::slab::Arena;
use super::PoolInner;
use crate::allocator::MemoryOwner;
use crate::error::MemoryError;

/// Where a segment lives; used to validate returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentHandle {
    pub(crate) segment_size: usize,
    pub(crate) slab: u64,
    pub(crate) index: usize,
}

/// Exclusive, move-only ownership of one pool segment.
///
/// The lease zeroes its bytes and returns the segment exactly once: either
/// through [`SegmentLease::release`], which reports failures, or on drop,
/// where failures are logged and counted instead of propagated.
pub struct SegmentLease {
    pool: Arc<PoolInner>,
    arena: Arc<Arena>,
    handle: SegmentHandle,
    offset: usize,
    released: bool,
    span: Option<tracing::Span>,
}

// SAFETY: The lease is the only party allowed to touch its segment while it
// is rented, and the arena is kept alive by the `Arc`. Moving the lease to
// another thread or sharing `&SegmentLease` (read-only access) is sound.
unsafe impl Send for SegmentLease {}
unsafe impl Sync for SegmentLease {}

impl SegmentLease {
    pub(crate) fn new(
        pool: Arc<PoolInner>,
        arena: Arc<Arena>,
        handle: SegmentHandle,
        offset: usize,
        span: Option<tracing::Span>,
    ) -> Self {
        Self {
            pool,
            arena,
            handle,
            offset,
            released: false,
            span,
        }
    }

    /// Length in bytes; always exactly the size that was rented.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.handle.segment_size
    }

    /// Always `false`: the pool never hands out empty segments.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.handle.segment_size == 0
    }

    /// Read-only view of the segment.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: [offset, offset + len) is inside the arena and rented to
        // this lease alone; `&self` prevents concurrent mutation through it.
        unsafe { std::slice::from_raw_parts(self.arena.ptr_at(self.offset), self.len()) }
    }

    /// Mutable view of the segment.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`, and `&mut self` guarantees uniqueness.
        unsafe { std::slice::from_raw_parts_mut(self.arena.ptr_at(self.offset), self.len()) }
    }

    /// Returns `true` if the slab backing this lease is `mlock`'d.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.arena.is_locked()
    }

    /// Zero the segment and return it to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UseAfterDispose`] if the pool was disposed
    /// while the lease was out, or the validation error the pool raised.
    pub fn release(mut self) -> Result<(), MemoryError> {
        self.give_back()
    }

    fn give_back(&mut self) -> Result<(), MemoryError> {
        self.as_mut_slice().zeroize();
        self.released = true;
        let result = self.pool.return_segment(self.handle, &self.arena);
        if let Some(span) = self.span.take() {
            let _entered = span.enter();
            match &result {
                Ok(()) => tracing::debug!("segment returned"),
                Err(e) => tracing::debug!(error = %e, "segment return rejected"),
            }
        }
        result
    }

    #[cfg(test)]
    pub(crate) const fn handle(&self) -> SegmentHandle {
        self.handle
    }

    #[cfg(test)]
    pub(crate) fn arena_for_test(&self) -> Arc<Arena> {
        Arc::clone(&self.arena)
    }
}

impl Drop for SegmentLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.give_back() {
            tracing::warn!(
                slab = self.handle.slab,
                segment = self.handle.index,
                error = %e,
                "segment return failed during drop"
            );
        }
    }
}

impl MemoryOwner for SegmentLease {
    fn as_slice(&self) -> &[u8] {
        Self::as_slice(self)
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        Self::as_mut_slice(self)
    }

    fn release(self: Box<Self>) -> Result<(), MemoryError> {
        Self::release(*self)
    }
}

impl fmt::Debug for SegmentLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SegmentLease {{ slab: {}, segment: {}, len: {}, bytes: *** }}",
            self.handle.slab, self.handle.index, self.handle.segment_size
        )
    }
}
