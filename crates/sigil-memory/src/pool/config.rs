//! Pool configuration and slab capacity strategies.

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Decides how many segments a new slab gets for a given segment size.
///
/// Implemented for every `Fn(usize) -> usize + Send + Sync`, so a closure is
/// enough for a custom strategy. A result of zero is treated as one.
pub trait CapacityStrategy: Send + Sync {
    /// Number of segments for a slab serving `segment_size`-byte rentals.
    fn segments_per_slab(&self, segment_size: usize) -> usize;
}

impl<F> CapacityStrategy for F
where
    F: Fn(usize) -> usize + Send + Sync,
{
    fn segments_per_slab(&self, segment_size: usize) -> usize {
        self(segment_size)
    }
}

/// One step of the tiered default strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CapacityTier {
    /// Largest segment size (inclusive) this tier applies to.
    pub max_segment_size: usize,
    /// Segments per slab for sizes in this tier.
    pub segments_per_slab: usize,
}

/// Slab pool settings.
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration. The default tiers are tuned for common key, hash, and
/// signature sizes: up to 64 bytes → 32 segments, up to 256 → 16,
/// up to 4096 → 8, anything larger → 4.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    /// Tiers ordered by strictly increasing `max_segment_size`.
    #[serde(default = "default_tiers")]
    pub capacity_tiers: Vec<CapacityTier>,

    /// Segments per slab for sizes above the last tier.
    #[serde(default = "default_fallback_segments")]
    pub fallback_segments_per_slab: usize,

    /// Whether slab arenas are `mlock`'d.
    #[serde(default = "default_lock_memory")]
    pub lock_memory: bool,

    /// Whether each rental gets a tracing span covering rent → return.
    #[serde(default)]
    pub trace_lifecycle: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity_tiers: default_tiers(),
            fallback_segments_per_slab: default_fallback_segments(),
            lock_memory: default_lock_memory(),
            trace_lifecycle: false,
        }
    }
}

fn default_tiers() -> Vec<CapacityTier> {
    vec![
        CapacityTier {
            max_segment_size: 64,
            segments_per_slab: 32,
        },
        CapacityTier {
            max_segment_size: 256,
            segments_per_slab: 16,
        },
        CapacityTier {
            max_segment_size: 4096,
            segments_per_slab: 8,
        },
    ]
}
const fn default_fallback_segments() -> usize {
    4
}
const fn default_lock_memory() -> bool {
    true
}

impl PoolConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Config`] if the JSON is malformed or the
    /// resulting configuration fails [`PoolConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, MemoryError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MemoryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the tier table.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Config`] if any segment count is zero or the
    /// tiers are not strictly increasing.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.fallback_segments_per_slab == 0 {
            return Err(MemoryError::Config(
                "fallbackSegmentsPerSlab must be greater than zero".into(),
            ));
        }
        let mut previous: Option<usize> = None;
        for tier in &self.capacity_tiers {
            if tier.segments_per_slab == 0 {
                return Err(MemoryError::Config(format!(
                    "tier for sizes up to {} has zero segments per slab",
                    tier.max_segment_size
                )));
            }
            if previous.is_some_and(|p| tier.max_segment_size <= p) {
                return Err(MemoryError::Config(
                    "capacity tiers must have strictly increasing maxSegmentSize".into(),
                ));
            }
            previous = Some(tier.max_segment_size);
        }
        Ok(())
    }

    /// The tiered strategy described by this configuration.
    #[must_use]
    pub fn strategy(&self) -> TieredCapacity {
        TieredCapacity {
            tiers: self.capacity_tiers.clone(),
            fallback: self.fallback_segments_per_slab,
        }
    }
}

/// Default capacity strategy: first tier whose bound covers the size wins.
#[derive(Debug, Clone)]
pub struct TieredCapacity {
    tiers: Vec<CapacityTier>,
    fallback: usize,
}

impl CapacityStrategy for TieredCapacity {
    fn segments_per_slab(&self, segment_size: usize) -> usize {
        self.tiers
            .iter()
            .find(|tier| segment_size <= tier.max_segment_size)
            .map_or(self.fallback, |tier| tier.segments_per_slab)
    }
}
