//! Digest-level filter machinery.
//!
//! This module contains everything below the value-hashing layer:
//!
//! - **Position generation**: [`McgFastRange`] turns one digest into a sequence of bucket
//!   positions.
//! - **Storage**: [`FilterStorage`] owns the aligned bucket array and implements copy,
//!   move, swap and resize with allocator propagation.
//! - **Engine**: [`FilterCore`] runs the insert and query probe loops over a subfilter.
//! - **Parameters**: capacity planning math.
//!
//! # Module Organization
//!
//! ```text
//! core/
//! ├── hash_strategy.rs - Multiplicative congruential position generator
//! ├── storage.rs       - Aligned bucket array and its lifecycle
//! ├── engine.rs        - Probe loop, set algebra, sizing
//! ├── params.rs        - Parameter calculations
//! └── mod.rs           - This file (public API)
//! ```
//!
//! # Examples
//!
//! ```
//! use bloomforge::alloc::Global;
//! use bloomforge::core::FilterCore;
//! use bloomforge::subfilter::Block;
//!
//! let mut core = FilterCore::<3, Block<u64, 2>, 0, Global>::new_in(4096, Global).unwrap();
//! core.insert(0xFEED_FACE_CAFE_BEEF);
//! assert!(core.may_contain(0xFEED_FACE_CAFE_BEEF));
//! ```

pub mod engine;
pub mod hash_strategy;
pub mod params;
pub mod storage;

pub use engine::{FilterCore, Shape};
pub use hash_strategy::McgFastRange;
pub use storage::{ArrayShape, FilterStorage};
