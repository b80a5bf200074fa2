//! Builder for [`Filter`].
//!
//! # Type-State Pattern
//!
//! The builder only offers `build` once a sizing mode is complete:
//!
//! ```text
//! Initial ──.bits(m)──────────────────────────────────────────→ Complete → Filter
//!    └────.expected_items(n)──→ WithItems ──.false_positive_rate(p)──↗
//! ```
//!
//! The hash builder and allocator can be replaced in any state.
//!
//! # Examples
//!
//! ## Target false positive rate
//!
//! ```
//! use bloomforge::builder::FilterBuilder;
//! use bloomforge::Filter;
//!
//! let filter: Filter<str, 5> = FilterBuilder::new()
//!     .expected_items(10_000)
//!     .false_positive_rate(0.01)
//!     .build()
//!     .unwrap();
//! assert!(Filter::<str, 5>::fpr_for(10_000, filter.capacity()) <= 0.01);
//! ```
//!
//! ## Explicit size and custom hashing
//!
//! ```
//! use bloomforge::builder::FilterBuilder;
//! use bloomforge::hash::XxHashBuilder;
//! use bloomforge::subfilter::FastMultiblock32;
//! use bloomforge::Filter;
//!
//! let filter: Filter<u64, 1, FastMultiblock32<8>, 0, XxHashBuilder> = FilterBuilder::new()
//!     .bits(1 << 20)
//!     .hasher(XxHashBuilder::with_seed(7))
//!     .build()
//!     .unwrap();
//! assert_eq!(filter.hash_function().seed(), 7);
//! ```
//!
//! ## Error Handling
//!
//! ```
//! use bloomforge::builder::FilterBuilder;
//! use bloomforge::Filter;
//!
//! let result: Result<Filter<u64, 5>, _> = FilterBuilder::new()
//!     .expected_items(100)
//!     .false_positive_rate(f64::NAN)
//!     .build();
//!
//! assert!(result.unwrap_err().is_usage_error());
//! ```

use crate::alloc::{FilterAllocator, Global};
use crate::error::Result;
use crate::filter::{Filter, Sizing};
use crate::hash::{DefaultHashBuilder, HashQuality};
use crate::subfilter::Subfilter;

/// Type-state marker: no sizing chosen.
#[derive(Debug, Clone, Copy)]
pub struct Initial;

/// Type-state marker: expected item count set, false positive rate missing.
#[derive(Debug, Clone, Copy)]
pub struct WithItems(usize);

/// Type-state marker: sizing complete.
#[derive(Debug, Clone, Copy)]
pub struct Complete(Sizing);

/// Builder for [`Filter`] with type-state guarantees.
///
/// # Type Parameters
///
/// - `State`: Current builder state ([`Initial`], [`WithItems`], [`Complete`])
/// - `H`: Hash builder handed to the filter
/// - `A`: Allocator handed to the filter
///
/// The filter's value type and compile-time shape are chosen at [`build`](Self::build)
/// time, usually through a type annotation.
#[derive(Debug, Clone)]
pub struct FilterBuilder<State, H = DefaultHashBuilder, A = Global> {
    state: State,
    hasher: H,
    alloc: A,
}

impl FilterBuilder<Initial> {
    /// Create a builder with the default hash builder and allocator.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::builder::FilterBuilder;
    ///
    /// let builder = FilterBuilder::new();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Initial,
            hasher: DefaultHashBuilder::default(),
            alloc: Global,
        }
    }
}

impl Default for FilterBuilder<Initial> {
    fn default() -> Self {
        Self::new()
    }
}

impl<State, H, A> FilterBuilder<State, H, A> {
    /// Replace the hash builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::builder::FilterBuilder;
    /// use bloomforge::hash::FnvHashBuilder;
    ///
    /// let builder = FilterBuilder::new().hasher(FnvHashBuilder);
    /// ```
    #[must_use]
    pub fn hasher<H2>(self, hasher: H2) -> FilterBuilder<State, H2, A> {
        FilterBuilder {
            state: self.state,
            hasher,
            alloc: self.alloc,
        }
    }

    /// Replace the allocator.
    #[must_use]
    pub fn allocator<A2>(self, alloc: A2) -> FilterBuilder<State, H, A2> {
        FilterBuilder {
            state: self.state,
            hasher: self.hasher,
            alloc,
        }
    }
}

impl<H, A> FilterBuilder<Initial, H, A> {
    /// Size the filter explicitly in bits.
    ///
    /// Transitions the builder to `Complete`.
    ///
    /// # Arguments
    ///
    /// * `bits` - Minimum capacity; rounded up to whole buckets. `0` builds a
    ///   zero-capacity filter.
    #[must_use]
    pub fn bits(self, bits: usize) -> FilterBuilder<Complete, H, A> {
        self.sizing(Sizing::Bits(bits))
    }

    /// Set the expected number of items.
    ///
    /// Transitions the builder to `WithItems`; a false positive rate must follow.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::builder::FilterBuilder;
    ///
    /// let builder = FilterBuilder::new()
    ///     .expected_items(10_000);
    /// ```
    #[must_use]
    pub fn expected_items(self, items: usize) -> FilterBuilder<WithItems, H, A> {
        FilterBuilder {
            state: WithItems(items),
            hasher: self.hasher,
            alloc: self.alloc,
        }
    }

    /// Use a prepared [`Sizing`].
    #[must_use]
    pub fn sizing(self, sizing: Sizing) -> FilterBuilder<Complete, H, A> {
        FilterBuilder {
            state: Complete(sizing),
            hasher: self.hasher,
            alloc: self.alloc,
        }
    }
}

impl<H, A> FilterBuilder<WithItems, H, A> {
    /// Set the target false positive rate.
    ///
    /// Transitions the builder to `Complete`. Validation happens at build time.
    ///
    /// # Arguments
    ///
    /// * `fpr` - Target false positive probability. Values `>= 1` build a
    ///   zero-capacity filter.
    #[must_use]
    pub fn false_positive_rate(self, fpr: f64) -> FilterBuilder<Complete, H, A> {
        let WithItems(items) = self.state;
        FilterBuilder {
            state: Complete(Sizing::Target { items, fpr }),
            hasher: self.hasher,
            alloc: self.alloc,
        }
    }
}

impl<H: HashQuality, A: FilterAllocator> FilterBuilder<Complete, H, A> {
    /// The chosen sizing.
    #[must_use]
    pub fn planned_sizing(&self) -> Sizing {
        self.state.0
    }

    /// Build the filter.
    ///
    /// # Errors
    ///
    /// - [`BloomError::InvalidFalsePositiveRate`](crate::BloomError) for a NaN rate
    /// - [`BloomError::CapacityOverflow`](crate::BloomError) for a rate `<= 0` with items
    ///   expected, or a size that does not fit in memory
    /// - [`BloomError::AllocationFailed`](crate::BloomError) if the allocator refuses
    pub fn build<T, const K: usize, S, const B: usize>(self) -> Result<Filter<T, K, S, B, H, A>>
    where
        T: ?Sized,
        S: Subfilter,
    {
        Filter::with_sizing_in(self.state.0, self.hasher, self.alloc)
    }

    /// Build the filter and report the parameters it was built with.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::builder::{FilterBuilder, FilterMetadata};
    /// use bloomforge::Filter;
    ///
    /// let (filter, metadata): (Filter<u64, 5>, FilterMetadata) = FilterBuilder::new()
    ///     .expected_items(10_000)
    ///     .false_positive_rate(0.01)
    ///     .build_with_metadata()
    ///     .unwrap();
    ///
    /// assert_eq!(metadata.capacity, filter.capacity());
    /// assert!(metadata.expected_fpr.unwrap() <= 0.01);
    /// ```
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build).
    #[allow(clippy::cast_precision_loss)]
    pub fn build_with_metadata<T, const K: usize, S, const B: usize>(
        self,
    ) -> Result<(Filter<T, K, S, B, H, A>, FilterMetadata)>
    where
        T: ?Sized,
        S: Subfilter,
    {
        let sizing = self.state.0;
        let filter: Filter<T, K, S, B, H, A> = self.build()?;
        let capacity = filter.capacity();

        let (expected_items, expected_fpr) = match sizing {
            Sizing::Bits(_) => (None, None),
            Sizing::Target { items, .. } => {
                (Some(items), Some(Filter::<T, K, S, B, H, A>::fpr_for(items, capacity)))
            }
        };
        let metadata = FilterMetadata {
            sizing,
            capacity,
            bucket_size: Filter::<T, K, S, B, H, A>::BUCKET_SIZE,
            k: K,
            expected_items,
            expected_fpr,
            bits_per_item: expected_items
                .filter(|&n| n > 0)
                .map(|n| capacity as f64 / n as f64),
        };
        tracing::debug!(?metadata, "filter built");
        Ok((filter, metadata))
    }
}

/// Parameters of a built filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterMetadata {
    /// Requested sizing.
    pub sizing: Sizing,
    /// Resulting capacity in bits.
    pub capacity: usize,
    /// Bytes between consecutive buckets.
    pub bucket_size: usize,
    /// Buckets probed per value.
    pub k: usize,
    /// Expected item count, when sized by target rate.
    pub expected_items: Option<usize>,
    /// Modeled false positive rate at the expected item count.
    pub expected_fpr: Option<f64>,
    /// Capacity divided by expected item count.
    pub bits_per_item: Option<f64>,
}
