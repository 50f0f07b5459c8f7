//! Exact-size slab pool for sensitive byte buffers.
//!
//! This module provides:
//! - [`SlabPool`]: rents segments of *exactly* the requested size, grows a
//!   size bucket by whole slabs, and reclaims idle slabs on demand
//! - [`SegmentLease`]: the move-only owner of one rented segment
//! - [`PoolConfig`] / [`CapacityStrategy`]: how big new slabs are
//!
//! # Guarantees
//!
//! - `rent(n)` yields `n` bytes, never more, zero-filled.
//! - A segment is never issued twice concurrently; returning a segment that
//!   is not recorded as rented fails with [`MemoryError::DoubleRelease`].
//! - Bytes are zeroed by the lease before the segment goes back on the free
//!   stack, and every free segment is zeroed again on [`SlabPool::dispose`].
//!
//! # Locking
//!
//! One pool-wide mutex guards the slab directory and all slab bookkeeping.
//! It is held only for the rent/return bookkeeping itself, never while a
//! caller uses the buffer.

mod config;
mod lease;
mod metrics;
mod pages;
mod slab;

pub use config::{CapacityStrategy, CapacityTier, PoolConfig, TieredCapacity};
pub use lease::SegmentLease;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::allocator::{BufferAllocator, OwnedBuffer};
use crate::error::MemoryError;
use lease::SegmentHandle;
use metrics::{Layout, PoolMetrics};
use slab::{Arena, Slab};

/// Point-in-time view of pool occupancy and traffic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatistics {
    /// Slabs currently owned.
    pub slabs: usize,
    /// Segments across all slabs.
    pub total_segments: usize,
    /// Segments rented and not yet returned.
    pub active_rentals: usize,
    /// Bytes held in slab arenas.
    pub allocated_bytes: usize,
    /// `active_rentals / total_segments`, or 0 for an empty pool.
    pub efficiency: f64,
    /// Successful rents since creation.
    pub rents: u64,
    /// Successful returns since creation.
    pub returns: u64,
}

/// Slab directory keyed by segment size.
#[derive(Default)]
struct Directory {
    disposed: bool,
    buckets: HashMap<usize, Vec<Slab>>,
    next_slab_id: u64,
    layout: Layout,
}

impl Directory {
    fn find_slab_mut(&mut self, segment_size: usize, id: u64) -> Option<&mut Slab> {
        self.buckets
            .get_mut(&segment_size)?
            .iter_mut()
            .find(|slab| slab.id() == id)
    }
}

pub(crate) struct PoolInner {
    directory: Mutex<Directory>,
    strategy: Box<dyn CapacityStrategy>,
    lock_memory: bool,
    trace_lifecycle: bool,
    metrics: PoolMetrics,
}

impl PoolInner {
    fn lock(&self) -> Result<MutexGuard<'_, Directory>, MemoryError> {
        self.directory
            .lock()
            .map_err(|_| MemoryError::Corruption("pool lock poisoned".into()))
    }

    /// Validate and record the return of one segment.
    ///
    /// The lease has already zeroed the bytes; writing them here would race
    /// with a forged or stale handle that does not own the segment.
    pub(crate) fn return_segment(
        &self,
        handle: SegmentHandle,
        arena: &Arc<Arena>,
    ) -> Result<(), MemoryError> {
        let result = self.try_return_segment(handle, arena);
        if result.is_err() {
            self.metrics.release_failures.inc();
        }
        result
    }

    fn try_return_segment(
        &self,
        handle: SegmentHandle,
        arena: &Arc<Arena>,
    ) -> Result<(), MemoryError> {
        let mut dir = self.lock()?;
        if dir.disposed {
            // The segment left with its slab, but it is no longer outstanding.
            dir.layout.active = dir.layout.active.saturating_sub(1);
            self.metrics.record_layout(&dir.layout);
            return Err(MemoryError::UseAfterDispose("slab pool"));
        }
        let slab = dir
            .find_slab_mut(handle.segment_size, handle.slab)
            .ok_or_else(|| {
                MemoryError::Corruption(format!(
                    "segment returned to unknown slab {} (size {})",
                    handle.slab, handle.segment_size
                ))
            })?;
        if !Arc::ptr_eq(slab.arena(), arena) {
            return Err(MemoryError::Corruption(format!(
                "segment {} does not belong to slab {}",
                handle.index, handle.slab
            )));
        }
        slab.release(handle.index)?;
        dir.layout.active = dir.layout.active.saturating_sub(1);
        self.metrics.returns.inc();
        self.metrics.record_layout(&dir.layout);
        Ok(())
    }
}

/// Thread-safe slab allocator for key material and signatures.
///
/// Dropping the pool disposes it. Share it across threads behind an
/// [`Arc`]; [`BufferAllocator`] is implemented for both `SlabPool` and
/// `Arc<SlabPool>`.
pub struct SlabPool {
    inner: Arc<PoolInner>,
}

impl SlabPool {
    /// Pool with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Metrics`] if the metric registry cannot be built.
    pub fn new() -> Result<Self, MemoryError> {
        Self::with_config(PoolConfig::default())
    }

    /// Pool using the tiered strategy from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Config`] if `config` fails validation, or
    /// [`MemoryError::Metrics`] if the metric registry cannot be built.
    pub fn with_config(config: PoolConfig) -> Result<Self, MemoryError> {
        config.validate()?;
        let strategy = config.strategy();
        Self::with_strategy(&config, strategy)
    }

    /// Pool using a custom capacity strategy; `config`'s tiers are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Metrics`] if the metric registry cannot be built.
    pub fn with_strategy(
        config: &PoolConfig,
        strategy: impl CapacityStrategy + 'static,
    ) -> Result<Self, MemoryError> {
        Ok(Self {
            inner: Arc::new(PoolInner {
                directory: Mutex::new(Directory::default()),
                strategy: Box::new(strategy),
                lock_memory: config.lock_memory,
                trace_lifecycle: config.trace_lifecycle,
                metrics: PoolMetrics::new()?,
            }),
        })
    }

    /// Rent a zero-filled segment of exactly `size` bytes.
    ///
    /// Grows the size bucket by one slab when every existing slab for
    /// `size` is full.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::ArgumentInvalid`] if `size` is zero or the new slab
    ///   would overflow the address space
    /// - [`MemoryError::UseAfterDispose`] if the pool was disposed
    /// - [`MemoryError::Corruption`] if the pool lock is poisoned
    pub fn rent(&self, size: usize) -> Result<SegmentLease, MemoryError> {
        if size == 0 {
            return Err(MemoryError::ArgumentInvalid(
                "buffer size must be greater than zero".into(),
            ));
        }
        let inner = &self.inner;
        let mut guard = inner.lock()?;
        let dir = &mut *guard;
        if dir.disposed {
            return Err(MemoryError::UseAfterDispose("slab pool"));
        }
        inner.metrics.observe_request(size);

        let bucket = dir.buckets.entry(size).or_default();
        let mut rented = bucket
            .iter_mut()
            .find_map(|slab| slab.try_rent().map(|index| (slab.id(), index)));

        if rented.is_none() {
            let count = inner.strategy.segments_per_slab(size).max(1);
            let id = dir.next_slab_id;
            let mut slab = Slab::new(id, size, count, inner.lock_memory)?;
            dir.next_slab_id = id.wrapping_add(1);
            dir.layout.slabs = dir.layout.slabs.saturating_add(1);
            dir.layout.segments = dir.layout.segments.saturating_add(count);
            dir.layout.bytes = dir.layout.bytes.saturating_add(slab.byte_len());
            tracing::debug!(
                slab = id,
                segment_size = size,
                segments = count,
                "growing slab pool"
            );
            rented = slab.try_rent().map(|index| (id, index));
            bucket.push(slab);
        }

        let (slab_id, index) = rented.ok_or_else(|| {
            MemoryError::Corruption(format!("fresh slab for size {size} had no free segment"))
        })?;
        let slab = bucket
            .iter()
            .find(|slab| slab.id() == slab_id)
            .ok_or_else(|| MemoryError::Corruption(format!("slab {slab_id} vanished")))?;
        let offset = slab
            .offset_of(index)
            .ok_or_else(|| MemoryError::Corruption(format!("segment {index} out of range")))?;
        let arena = Arc::clone(slab.arena());

        dir.layout.active = dir.layout.active.saturating_add(1);
        inner.metrics.rents.inc();
        inner.metrics.record_layout(&dir.layout);
        drop(guard);

        let span = inner.trace_lifecycle.then(|| {
            tracing::debug_span!("sensitive_buffer", size, slab = slab_id, segment = index)
        });
        Ok(SegmentLease::new(
            Arc::clone(inner),
            arena,
            SegmentHandle {
                segment_size: size,
                slab: slab_id,
                index,
            },
            offset,
            span,
        ))
    }

    /// Dispose every slab whose segments are all free.
    ///
    /// Meant for periodic maintenance: the pool lock is held for the whole
    /// sweep. Returns the number of slabs reclaimed.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UseAfterDispose`] if the pool was disposed, or
    /// [`MemoryError::Corruption`] if the pool lock is poisoned.
    pub fn trim_excess(&self) -> Result<usize, MemoryError> {
        let mut guard = self.inner.lock()?;
        let dir = &mut *guard;
        if dir.disposed {
            return Err(MemoryError::UseAfterDispose("slab pool"));
        }
        let mut reclaimed = 0usize;
        let mut layout = dir.layout;
        for bucket in dir.buckets.values_mut() {
            bucket.retain(|slab| {
                if !slab.is_idle() {
                    return true;
                }
                slab.zero_free_segments();
                reclaimed = reclaimed.saturating_add(1);
                layout.slabs = layout.slabs.saturating_sub(1);
                layout.segments = layout.segments.saturating_sub(slab.segment_count());
                layout.bytes = layout.bytes.saturating_sub(slab.byte_len());
                false
            });
        }
        dir.buckets.retain(|_, bucket| !bucket.is_empty());
        dir.layout = layout;

        self.inner
            .metrics
            .slabs_trimmed
            .inc_by(u64::try_from(reclaimed).unwrap_or(u64::MAX));
        self.inner.metrics.record_layout(&dir.layout);
        tracing::debug!(reclaimed, remaining = dir.layout.slabs, "trimmed slab pool");
        Ok(reclaimed)
    }

    /// Zero every free segment, drop every slab, and refuse further rents.
    ///
    /// Idempotent. Segments still rented are zeroed by their leases when
    /// released; those returns are rejected and logged, never panicking.
    pub fn dispose(&self) {
        let mut dir = self
            .inner
            .directory
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if dir.disposed {
            return;
        }
        dir.disposed = true;
        let outstanding = dir.layout.active;
        for slab in dir.buckets.values().flatten() {
            slab.zero_free_segments();
        }
        dir.buckets.clear();
        dir.layout = Layout {
            active: outstanding,
            ..Layout::default()
        };
        self.inner.metrics.record_layout(&dir.layout);
        tracing::debug!(outstanding, "slab pool disposed");
    }

    /// Returns `true` once [`SlabPool::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner
            .directory
            .lock()
            .map_or(true, |dir| dir.disposed)
    }

    /// Snapshot of occupancy and traffic counters.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Corruption`] if the pool lock is poisoned.
    pub fn statistics(&self) -> Result<PoolStatistics, MemoryError> {
        let dir = self.inner.lock()?;
        let layout = dir.layout;
        Ok(PoolStatistics {
            slabs: layout.slabs,
            total_segments: layout.segments,
            active_rentals: layout.active,
            allocated_bytes: layout.bytes,
            efficiency: layout.efficiency(),
            rents: self.inner.metrics.rents.get(),
            returns: self.inner.metrics.returns.get(),
        })
    }

    /// Prometheus registry holding this pool's metrics.
    #[must_use]
    pub fn metrics_registry(&self) -> &prometheus::Registry {
        self.inner.metrics.registry()
    }
}

impl Drop for SlabPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl BufferAllocator for SlabPool {
    fn rent(&self, size: usize) -> Result<OwnedBuffer, MemoryError> {
        Ok(Box::new(Self::rent(self, size)?))
    }
}

impl fmt::Debug for SlabPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.statistics() {
            Ok(stats) => f
                .debug_struct("SlabPool")
                .field("slabs", &stats.slabs)
                .field("active_rentals", &stats.active_rentals)
                .field("allocated_bytes", &stats.allocated_bytes)
                .finish(),
            Err(_) => f.write_str("SlabPool(poisoned)"),
        }
    }
}
