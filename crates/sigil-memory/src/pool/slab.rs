//! Slab sub-allocator: one contiguous arena cut into equal segments.
//!
//! Bookkeeping is an index stack of free segments (O(1) rent) plus a
//! rented bitset (O(1) validated return). A [`Slab`] is only ever touched
//! under the pool lock; the [`Arena`] it owns is shared with the leases that
//! point into it so the memory outlives pool disposal until the last lease
//! is gone.

use std::cell::UnsafeCell;
use std::sync::Arc;

use zeroize::Zeroize;

use super::pages;
use crate::error::MemoryError;

/// Backing memory of one slab.
///
/// Each segment is written by at most one party at a time: either the lease
/// that rented it, or the pool while it is free (under the pool lock). That
/// exclusivity is what makes handing out `&mut [u8]` views sound.
pub(crate) struct Arena {
    cells: Box<[UnsafeCell<u8>]>,
    pinned: bool,
}

// SAFETY: Segments are disjoint and each is accessed by a single owner at a
// time (see the type docs). Shared references to the arena never touch a
// segment they do not own.
unsafe impl Sync for Arena {}

impl Arena {
    fn new(len: usize, lock_memory: bool) -> Self {
        let cells: Box<[UnsafeCell<u8>]> = (0..len).map(|_| UnsafeCell::new(0)).collect();
        let base = UnsafeCell::raw_get(cells.as_ptr()).cast_const();
        let pinned = lock_memory && pages::pin(base, len);
        Self { cells, pinned }
    }

    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.cells.as_ptr())
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    pub(crate) const fn is_locked(&self) -> bool {
        self.pinned
    }

    /// Raw pointer to the byte at `offset`.
    ///
    /// # Safety
    ///
    /// `offset + len` must lie within the arena for whatever range the
    /// caller goes on to access, and the caller must hold exclusive rights
    /// to that range for the lifetime of any reference built from it.
    pub(crate) unsafe fn ptr_at(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.len());
        // SAFETY: upheld by the caller; offset is within the allocation.
        unsafe { self.base().add(offset) }
    }

    /// Overwrite `len` bytes at `offset` with zeros.
    ///
    /// # Safety
    ///
    /// Same contract as [`Arena::ptr_at`]: the range must be in bounds and
    /// not concurrently accessed by anyone else.
    pub(crate) unsafe fn zero_range(&self, offset: usize, len: usize) {
        // SAFETY: forwarded contract.
        let bytes = unsafe { std::slice::from_raw_parts_mut(self.ptr_at(offset), len) };
        bytes.zeroize();
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no lease or slab can reach the cells.
        let bytes = unsafe { std::slice::from_raw_parts_mut(self.base(), self.cells.len()) };
        bytes.zeroize();
        if self.pinned {
            pages::unpin(self.base().cast_const(), self.cells.len());
        }
    }
}

/// Fixed-size rented/free bitset, one bit per segment.
struct RentedBits {
    words: Vec<u64>,
}

impl RentedBits {
    fn new(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
        }
    }

    #[allow(clippy::cast_possible_truncation)] // index % 64 always fits in u32
    const fn locate(index: usize) -> (usize, u64) {
        (index / 64, 1u64.wrapping_shl((index % 64) as u32))
    }

    fn get(&self, index: usize) -> bool {
        let (word, mask) = Self::locate(index);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    fn set(&mut self, index: usize, rented: bool) {
        let (word, mask) = Self::locate(index);
        if let Some(w) = self.words.get_mut(word) {
            if rented {
                *w |= mask;
            } else {
                *w &= !mask;
            }
        }
    }
}

/// One arena divided into `segment_count` segments of `segment_size` bytes.
pub(crate) struct Slab {
    id: u64,
    segment_size: usize,
    segment_count: usize,
    arena: Arc<Arena>,
    free: Vec<usize>,
    rented: RentedBits,
}

impl Slab {
    /// Allocate a zeroed slab.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ArgumentInvalid`] if either dimension is zero
    /// or the arena size overflows `usize`.
    pub(crate) fn new(
        id: u64,
        segment_size: usize,
        segment_count: usize,
        lock_memory: bool,
    ) -> Result<Self, MemoryError> {
        if segment_size == 0 || segment_count == 0 {
            return Err(MemoryError::ArgumentInvalid(format!(
                "slab dimensions must be non-zero (segment size {segment_size}, count {segment_count})"
            )));
        }
        let len = segment_size.checked_mul(segment_count).ok_or_else(|| {
            MemoryError::ArgumentInvalid(format!(
                "slab of {segment_count} x {segment_size} bytes overflows the address space"
            ))
        })?;
        Ok(Self {
            id,
            segment_size,
            segment_count,
            arena: Arc::new(Arena::new(len, lock_memory)),
            // Reversed so segment 0 is handed out first.
            free: (0..segment_count).rev().collect(),
            rented: RentedBits::new(segment_count),
        })
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) const fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.arena.len()
    }

    pub(crate) const fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.segment_count.saturating_sub(self.free.len())
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.free.len() == self.segment_count
    }

    /// Byte offset of segment `index` inside the arena.
    pub(crate) fn offset_of(&self, index: usize) -> Option<usize> {
        if index < self.segment_count {
            index.checked_mul(self.segment_size)
        } else {
            None
        }
    }

    /// Pop a free segment and mark it rented.
    pub(crate) fn try_rent(&mut self) -> Option<usize> {
        let index = self.free.pop()?;
        debug_assert!(!self.rented.get(index), "free stack held a rented segment");
        self.rented.set(index, true);
        Some(index)
    }

    /// Mark segment `index` free again.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Corruption`] if `index` is out of range and
    /// [`MemoryError::DoubleRelease`] if the segment is not currently rented.
    pub(crate) fn release(&mut self, index: usize) -> Result<(), MemoryError> {
        if index >= self.segment_count {
            return Err(MemoryError::Corruption(format!(
                "segment {index} is outside slab {} ({} segments)",
                self.id, self.segment_count
            )));
        }
        if !self.rented.get(index) {
            return Err(MemoryError::DoubleRelease {
                slab: self.id,
                segment: index,
            });
        }
        self.rented.set(index, false);
        self.free.push(index);
        Ok(())
    }

    /// Zero every segment that is currently free.
    pub(crate) fn zero_free_segments(&self) {
        for &index in &self.free {
            if let Some(offset) = self.offset_of(index) {
                // SAFETY: free segments have no lease, and the caller holds the
                // pool lock, so nothing else can reach this range.
                unsafe { self.arena.zero_range(offset, self.segment_size) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slab(count: usize) -> Slab {
        Slab::new(7, 16, count, false).expect("valid slab")
    }

    #[test]
    fn rents_every_segment_exactly_once() {
        let mut s = slab(4);
        let mut seen: Vec<usize> = std::iter::from_fn(|| s.try_rent()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert!(s.try_rent().is_none());
        assert_eq!(s.active(), 4);
    }

    #[test]
    fn release_makes_segment_rentable_again() {
        let mut s = slab(2);
        let a = s.try_rent().expect("free segment");
        let _b = s.try_rent().expect("free segment");
        assert!(s.try_rent().is_none());
        s.release(a).expect("rented segment");
        assert_eq!(s.try_rent(), Some(a));
    }

    #[test]
    fn double_release_is_rejected() {
        let mut s = slab(2);
        let a = s.try_rent().expect("free segment");
        s.release(a).expect("first release");
        assert_eq!(
            s.release(a),
            Err(MemoryError::DoubleRelease { slab: 7, segment: a })
        );
        assert_eq!(s.active(), 0);
        assert!(s.is_idle());
    }

    #[test]
    fn release_of_never_rented_segment_is_rejected() {
        let mut s = slab(3);
        assert!(matches!(s.release(1), Err(MemoryError::DoubleRelease { .. })));
    }

    #[test]
    fn out_of_range_release_is_corruption() {
        let mut s = slab(3);
        assert!(matches!(s.release(3), Err(MemoryError::Corruption(_))));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(Slab::new(1, 0, 4, false).is_err());
        assert!(Slab::new(1, 4, 0, false).is_err());
        assert!(Slab::new(1, usize::MAX, 2, false).is_err());
    }

    #[test]
    fn bitset_spans_multiple_words() {
        let mut s = slab(130);
        let rented: Vec<usize> = std::iter::from_fn(|| s.try_rent()).collect();
        assert_eq!(rented.len(), 130);
        s.release(129).expect("last segment is rented");
        s.release(64).expect("word boundary segment is rented");
        assert_eq!(s.active(), 128);
    }

    #[test]
    fn unpinned_arena_reports_unlocked() {
        let s = slab(2);
        assert!(!s.arena().is_locked());
    }

    #[test]
    fn offsets_follow_segment_size() {
        let s = slab(4);
        assert_eq!(s.offset_of(0), Some(0));
        assert_eq!(s.offset_of(3), Some(48));
        assert_eq!(s.offset_of(4), None);
        assert_eq!(s.byte_len(), 64);
    }
}
