//! `sigil-memory`: Pooled, zeroizing storage for SIGIL key material.
//!
//! Key bytes and signatures live in exact-size segments rented from a
//! [`SlabPool`], carry a [`Tag`] of typed metadata, and are zeroed and
//! returned exactly once through [`SensitiveMemory::dispose`].

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;

pub mod facets;
pub mod tag;
pub mod tags;

pub mod allocator;
pub mod pool;

pub mod memory;

pub use allocator::{BufferAllocator, HeapAllocator, MemoryOwner, OwnedBuffer};
pub use error::MemoryError;
pub use facets::{
    BufferKind, CryptoAlgorithm, EncodingScheme, MaterialSemantics, Purpose, Qualifier,
};
pub use memory::{
    MemoryView, PrivateKeyBytes, PrivateKeyMemory, PublicKeyMemory, SensitiveBuffer,
    SensitiveMemory, Signature,
};
pub use pool::{
    CapacityStrategy, CapacityTier, PoolConfig, PoolStatistics, SegmentLease, SlabPool,
    TieredCapacity,
};
pub use tag::{Facet, Tag, TagBuilder};
