//! Prometheus metrics for one slab pool.
//!
//! Each pool owns its own [`Registry`] so several pools (or tests) never
//! collide on metric names. Scrapers pick it up via
//! [`SlabPool::metrics_registry`](super::SlabPool::metrics_registry).

use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

use crate::error::MemoryError;

/// Bucket bounds for requested sizes: common key, hash, and signature widths.
const SIZE_BUCKETS: &[f64] = &[
    16.0, 32.0, 64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 4096.0, 8192.0,
];

pub(crate) struct PoolMetrics {
    registry: Registry,
    slabs: IntGauge,
    active_rentals: IntGauge,
    allocated_bytes: IntGauge,
    efficiency: Gauge,
    requested_size: Histogram,
    pub(crate) rents: IntCounter,
    pub(crate) returns: IntCounter,
    pub(crate) slabs_trimmed: IntCounter,
    pub(crate) release_failures: IntCounter,
}

impl PoolMetrics {
    pub(crate) fn new() -> Result<Self, MemoryError> {
        let registry = Registry::new();

        let slabs = IntGauge::new("sigil_pool_slabs", "Slabs currently owned by the pool")?;
        let active_rentals = IntGauge::new(
            "sigil_pool_active_rentals",
            "Segments currently rented and not yet returned",
        )?;
        let allocated_bytes = IntGauge::new(
            "sigil_pool_allocated_bytes",
            "Total bytes held in slab arenas",
        )?;
        let efficiency = Gauge::new(
            "sigil_pool_efficiency",
            "Rented segments divided by total segments",
        )?;
        let requested_size = Histogram::with_opts(
            HistogramOpts::new(
                "sigil_pool_requested_size_bytes",
                "Sizes requested from the pool",
            )
            .buckets(SIZE_BUCKETS.to_vec()),
        )?;
        let rents = IntCounter::new("sigil_pool_rents_total", "Successful rent operations")?;
        let returns = IntCounter::new("sigil_pool_returns_total", "Successful return operations")?;
        let slabs_trimmed = IntCounter::new(
            "sigil_pool_slabs_trimmed_total",
            "Idle slabs reclaimed by trim_excess",
        )?;
        let release_failures = IntCounter::new(
            "sigil_pool_release_failures_total",
            "Returns rejected or swallowed during disposal",
        )?;

        registry.register(Box::new(slabs.clone()))?;
        registry.register(Box::new(active_rentals.clone()))?;
        registry.register(Box::new(allocated_bytes.clone()))?;
        registry.register(Box::new(efficiency.clone()))?;
        registry.register(Box::new(requested_size.clone()))?;
        registry.register(Box::new(rents.clone()))?;
        registry.register(Box::new(returns.clone()))?;
        registry.register(Box::new(slabs_trimmed.clone()))?;
        registry.register(Box::new(release_failures.clone()))?;

        Ok(Self {
            registry,
            slabs,
            active_rentals,
            allocated_bytes,
            efficiency,
            requested_size,
            rents,
            returns,
            slabs_trimmed,
            release_failures,
        })
    }

    pub(crate) const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) fn active_rentals(&self) -> i64 {
        self.active_rentals.get()
    }

    #[allow(clippy::cast_precision_loss)] // sizes far below 2^52
    pub(crate) fn observe_request(&self, size: usize) {
        self.requested_size.observe(size as f64);
    }

    /// Publish the pool layout after a directory change.
    pub(crate) fn record_layout(&self, layout: &Layout) {
        self.slabs.set(to_i64(layout.slabs));
        self.active_rentals.set(to_i64(layout.active));
        self.allocated_bytes.set(to_i64(layout.bytes));
        self.efficiency.set(layout.efficiency());
    }
}

/// Aggregate directory counters, maintained under the pool lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub(crate) slabs: usize,
    pub(crate) segments: usize,
    pub(crate) active: usize,
    pub(crate) bytes: usize,
}

impl Layout {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn efficiency(&self) -> f64 {
        if self.segments == 0 {
            0.0
        } else {
            self.active as f64 / self.segments as f64
        }
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
