//! Builder pattern for filter construction.
//!
//! A filter's shape (value type, probe count, subfilter, bucket size) is fixed by its type.
//! What remains to choose at runtime is the sizing, the hash builder and the allocator, and
//! [`FilterBuilder`] collects those with compile-time guarantees that a sizing mode was
//! completed.
//!
//! # Design Philosophy
//!
//! ## Type-State Pattern
//!
//! The builder progresses through states, with `build` only available once sizing is
//! complete. Forgetting the false positive rate after `expected_items` is a compile error.
//!
//! ## Error Handling
//!
//! - **Compile-time errors**: Missing sizing
//! - **Runtime errors**: NaN or non-positive rates, sizes that do not fit, allocation
//!   failure
//!
//! # Examples
//!
//! ```
//! use bloomforge::builder::FilterBuilder;
//! use bloomforge::subfilter::Block;
//! use bloomforge::Filter;
//!
//! let filter: Filter<&str, 2, Block<u64, 4>> = FilterBuilder::new()
//!     .expected_items(10_000)
//!     .false_positive_rate(0.001)
//!     .build()
//!     .unwrap();
//! ```
//!
//! # Sizing Modes
//!
//! | Mode | Calls | Capacity |
//! |------|-------|----------|
//! | Explicit | `.bits(m)` | `m` rounded up to whole buckets |
//! | Target | `.expected_items(n).false_positive_rate(p)` | [`Filter::capacity_for`](crate::Filter::capacity_for) |
//! | Prepared | `.sizing(s)` | either of the above |

#![allow(clippy::module_name_repetitions)]

pub mod filter;

pub use filter::{Complete, FilterBuilder, FilterMetadata, Initial, WithItems};

/// Prelude for convenient builder imports.
pub mod prelude {
    pub use super::{FilterBuilder, FilterMetadata};
    pub use crate::filter::Sizing;
}
