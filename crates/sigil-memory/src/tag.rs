//! Immutable, type-keyed metadata attached to every sensitive buffer.
//!
//! A [`Tag`] maps a facet *type* (for example [`CryptoAlgorithm`] or
//! [`Purpose`]) to exactly one value of that type. It is built once through
//! [`TagBuilder`] and never mutated afterwards; cloning only bumps a
//! reference count.
//!
//! ```
//! use sigil_memory::facets::{CryptoAlgorithm, Purpose};
//! use sigil_memory::tag::Tag;
//!
//! let tag = Tag::builder()
//!     .with(CryptoAlgorithm::Ed25519)
//!     .with(Purpose::Signing)
//!     .build();
//!
//! assert_eq!(tag.get::<CryptoAlgorithm>(), Some(&CryptoAlgorithm::Ed25519));
//! ```
//!
//! [`CryptoAlgorithm`]: crate::facets::CryptoAlgorithm
//! [`Purpose`]: crate::facets::Purpose

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Any value usable as a tag facet.
///
/// Blanket-implemented for every `'static + Debug + Eq + Send + Sync` type,
/// so callers can introduce their own facets without registration.
pub trait Facet: Any + fmt::Debug + Eq + Send + Sync {}

impl<T: Any + fmt::Debug + Eq + Send + Sync> Facet for T {}

/// Object-safe view of a facet value used for storage and comparison.
trait ErasedFacet: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_erased(&self, other: &dyn ErasedFacet) -> bool;
}

impl<T: Facet> ErasedFacet for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_erased(&self, other: &dyn ErasedFacet) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }
}

type Entries = Vec<(TypeId, Arc<dyn ErasedFacet>)>;

/// Immutable metadata describing a buffer's algorithm, purpose, encoding,
/// and semantics. Compared by full-map equality.
#[derive(Clone)]
pub struct Tag {
    entries: Arc<Entries>,
}

impl Tag {
    /// Start building a new tag.
    #[must_use]
    pub fn builder() -> TagBuilder {
        TagBuilder::default()
    }

    /// A tag with no facets.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Arc::new(Vec::new()),
        }
    }

    /// Look up the value stored for facet type `T`.
    #[must_use]
    pub fn get<T: Facet>(&self) -> Option<&T> {
        let wanted = TypeId::of::<T>();
        self.entries
            .iter()
            .find(|(id, _)| *id == wanted)
            .and_then(|(_, value)| value.as_any().downcast_ref::<T>())
    }

    /// Returns `true` if a value is stored for facet type `T`.
    #[must_use]
    pub fn contains<T: Facet>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Number of facets in the tag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tag carries no facets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derive a new tag with `value` added or replacing the existing value
    /// of the same facet type. `self` is left untouched.
    #[must_use]
    pub fn with<T: Facet>(&self, value: T) -> Self {
        TagBuilder {
            entries: self.entries.as_ref().clone(),
        }
        .with(value)
        .build()
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.entries, &other.entries) {
            return true;
        }
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(id, value)| {
                other.entries.iter().any(|(other_id, other_value)| {
                    other_id == id && value.eq_erased(other_value.as_ref())
                })
            })
    }
}

impl Eq for Tag {}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tag")?;
        f.debug_set()
            .entries(self.entries.iter().map(|(_, value)| value))
            .finish()
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::empty()
    }
}

/// One-shot builder for [`Tag`].
#[derive(Default)]
pub struct TagBuilder {
    entries: Entries,
}

impl TagBuilder {
    /// Set the value for facet type `T`, replacing any earlier value.
    #[must_use]
    pub fn with<T: Facet>(mut self, value: T) -> Self {
        let id = TypeId::of::<T>();
        let value: Arc<dyn ErasedFacet> = Arc::new(value);
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((id, value)),
        }
        self
    }

    /// Freeze the builder into an immutable [`Tag`].
    #[must_use]
    pub fn build(self) -> Tag {
        Tag {
            entries: Arc::new(self.entries),
        }
    }
}
