//! Allocator capability consumed by the sensitive memory types.
//!
//! Anything that can hand out an exact-size, zero-on-release buffer can
//! stand in for [`SlabPool`](crate::pool::SlabPool). [`HeapAllocator`] is
//! the minimal conforming implementation.

use std::fmt;

use zeroize::Zeroizing;

use crate::error::MemoryError;

/// Owner of one rented buffer.
///
/// Dropping the owner returns the buffer to its allocator; [`release`]
/// does the same but reports failures to the caller.
///
/// [`release`]: MemoryOwner::release
pub trait MemoryOwner: Send + Sync {
    /// Read-only view of the whole buffer.
    fn as_slice(&self) -> &[u8];

    /// Mutable view of the whole buffer.
    fn as_mut_slice(&mut self) -> &mut [u8];

    /// Zero the buffer and hand it back to its allocator.
    ///
    /// # Errors
    ///
    /// Returns the allocator's verdict if the return is rejected
    /// (disposed allocator, double release, foreign slab).
    fn release(self: Box<Self>) -> Result<(), MemoryError>;
}

/// A boxed buffer owner, as produced by [`BufferAllocator::rent`].
pub type OwnedBuffer = Box<dyn MemoryOwner>;

/// Source of exact-size sensitive buffers.
pub trait BufferAllocator: Send + Sync {
    /// Rent a buffer of exactly `size` bytes, zero-filled.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ArgumentInvalid`] for `size == 0` and
    /// [`MemoryError::UseAfterDispose`] if the allocator was disposed.
    fn rent(&self, size: usize) -> Result<OwnedBuffer, MemoryError>;
}

impl<A: BufferAllocator + ?Sized> BufferAllocator for std::sync::Arc<A> {
    fn rent(&self, size: usize) -> Result<OwnedBuffer, MemoryError> {
        (**self).rent(size)
    }
}

/// Unpooled allocator: every rental is a fresh heap vector zeroed on drop.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn rent(&self, size: usize) -> Result<OwnedBuffer, MemoryError> {
        if size == 0 {
            return Err(MemoryError::ArgumentInvalid(
                "buffer size must be greater than zero".into(),
            ));
        }
        Ok(Box::new(HeapBuffer(Zeroizing::new(vec![0; size]))))
    }
}

struct HeapBuffer(Zeroizing<Vec<u8>>);

impl MemoryOwner for HeapBuffer {
    fn as_slice(&self) -> &[u8] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }

    fn release(self: Box<Self>) -> Result<(), MemoryError> {
        drop(self);
        Ok(())
    }
}

impl fmt::Debug for HeapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapBuffer<{}>(***)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_rent_is_exact_and_zeroed() {
        let buf = HeapAllocator.rent(48).expect("rent");
        assert_eq!(buf.as_slice().len(), 48);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn heap_rent_of_zero_is_invalid() {
        assert!(matches!(
            HeapAllocator.rent(0),
            Err(MemoryError::ArgumentInvalid(_))
        ));
    }

    #[test]
    fn heap_release_succeeds() {
        let mut buf = HeapAllocator.rent(4).expect("rent");
        buf.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        buf.release().expect("heap release never fails");
    }
}
