//! BloomForge: configurable, cache-conscious Bloom filters for Rust.
//!
//! BloomForge builds a Bloom filter from compile-time parts: how many buckets each value
//! probes, which subfilter marks bits inside a bucket, how far apart buckets are, which
//! hash builder digests values and which allocator owns the array. The classic
//! bit-per-probe filter and the blocked, SIMD-friendly variants are all instances of the
//! same [`Filter`] type.
//!
//! # What are Bloom Filters?
//!
//! A Bloom filter is a space-efficient probabilistic data structure that tests whether
//! an element is a member of a set. It can produce:
//! - **False positives**: May indicate an element is in the set when it isn't
//! - **Zero false negatives**: If it says an element isn't in the set, it definitely isn't
//!
//! # Quick Start
//!
//! ```
//! use bloomforge::Filter;
//!
//! // Classic layout: 5 probes, one bit each, sized for 10,000 items at 1%
//! let mut filter = Filter::<str, 5>::with_false_positive_rate(10_000, 0.01).unwrap();
//!
//! filter.insert("hello");
//! filter.insert("world");
//!
//! assert!(filter.may_contain("hello"));   // true - inserted values are always found
//! assert!(filter.may_contain("world"));
//! ```
//!
//! # Choosing a Layout
//!
//! | Type | Probes touch | Bits per probe | Notes |
//! |------|--------------|----------------|-------|
//! | `Filter<T, K>` | K bytes anywhere | 1 | Classic filter, best rate per bit |
//! | `Filter<T, K, Block<u64, B>>` | K words | B in one word | One load per probe |
//! | `Filter<T, K, Multiblock<u64, B>>` | K × B words | 1 per word | Spreads bits, stays in a cache line |
//! | `Filter<T, K, FastMultiblock32<B>>` | K × B lanes | 1 per lane | SSE2 on x86_64 |
//!
//! Setting the bucket size `B` below the subfilter's block size makes blocks overlap,
//! trading a little speed for a lower false positive rate at the same capacity:
//!
//! ```
//! use bloomforge::subfilter::Multiblock;
//! use bloomforge::Filter;
//!
//! type Overlapping = Filter<u64, 1, Multiblock<u64, 8>, 1>;
//! type Disjoint = Filter<u64, 1, Multiblock<u64, 8>>;
//!
//! let bits = 1 << 20;
//! assert!(Overlapping::fpr_for(100_000, bits) < Disjoint::fpr_for(100_000, bits));
//! ```
//!
//! # Using Builders
//!
//! ```
//! use bloomforge::builder::FilterBuilder;
//! use bloomforge::subfilter::FastMultiblock32;
//! use bloomforge::Filter;
//!
//! let filter: Filter<u64, 1, FastMultiblock32<8>> = FilterBuilder::new()
//!     .expected_items(1_000_000)
//!     .false_positive_rate(0.001)
//!     .build()
//!     .unwrap();
//! ```
//!
//! # Combining Filters
//!
//! Filters with the same configuration and capacity can be merged bitwise:
//!
//! ```
//! use bloomforge::Filter;
//!
//! let mut left = Filter::<u32, 3>::new(4096).unwrap();
//! let mut right = Filter::<u32, 3>::new(4096).unwrap();
//! left.insert(&1);
//! right.insert(&2);
//!
//! left.union(&right).unwrap();
//! assert!(left.may_contain(&1) && left.may_contain(&2));
//!
//! let small = Filter::<u32, 3>::new(64).unwrap();
//! assert!(left.union(&small).is_err());
//! ```
//!
//! # Features
//!
//! - `simd` (default) - SSE2 marking and checking for [`FastMultiblock32`] on x86_64.
//!   Without it, or on other targets, portable lanes produce bit-identical arrays.
//!
//! # Unsafe Code Policy
//!
//! Unsafe code is confined to the storage layer and the probe loop:
//! - **Storage**: raw allocation through [`FilterAllocator`] with manual alignment
//! - **Engine**: unaligned block reads and writes at bucket offsets
//! - **Subfilters**: [`Subfilter`] is an unsafe trait because blocks are read from raw bytes
//! - **SIMD**: SSE2 intrinsics behind `cfg(target_arch = "x86_64")`
//!
//! All public methods are safe.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::assertions_on_constants)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_root_url = "https://docs.rs/bloomforge/0.1.0")]

/// Allocator capability used by filter storage
pub mod alloc;

/// Type-safe filter builder
pub mod builder;

/// Digest-level engine: position generation, storage, probe loop, sizing math
pub mod core;

/// Error types and result aliases
pub mod error;

/// The value-level filter
pub mod filter;

/// Hash builders and digest mixing
pub mod hash;

/// Bucket-level marking strategies
pub mod subfilter;

// Re-export commonly used types at crate root
pub use alloc::{FilterAllocator, Global, Propagation};
pub use builder::FilterBuilder;
pub use error::{BloomError, Result};
pub use filter::{Filter, Sizing};
pub use hash::{Avalanching, FnvHashBuilder, HashQuality, XxHashBuilder};
pub use subfilter::{Block, FastMultiblock32, Multiblock, Subfilter};

/// Prelude module for convenient imports.
///
/// # Examples
///
/// ```
/// use bloomforge::prelude::*;
///
/// let mut filter: Filter<str, 4, Block<u64, 2>> = Filter::new(1000).unwrap();
/// filter.insert("hello");
/// assert!(filter.may_contain("hello"));
/// ```
pub mod prelude {
    pub use crate::alloc::{FilterAllocator, Global};
    pub use crate::builder::FilterBuilder;
    pub use crate::error::{BloomError, Result};
    pub use crate::filter::{Filter, Sizing};
    pub use crate::hash::{Avalanching, FnvHashBuilder, HashQuality, XxHashBuilder};
    pub use crate::subfilter::{Block, FastMultiblock32, Multiblock, Subfilter};
}
