//! Hashing for filters: builders, quality markers and digest mixing.
//!
//! # Module Structure
//!
//! ```text
//! hash/
//! ├── hasher.rs  - HashQuality marker, Avalanching wrapper, FNV-1a builder
//! ├── mix.rs     - mulx64 extended-multiplication mixer
//! ├── xxhash.rs  - XXH3 builder (the default)
//! └── mod.rs     - This file (digest policy)
//! ```
//!
//! # Digest policy
//!
//! A filter turns each value into one 64-bit digest with [`digest`]. The raw hash is used
//! as is when the builder avalanches and `usize` is at least 64 bits wide; otherwise it is
//! conditioned with [`mulx64_mix`]. The policy is decided per builder type at compile time.
//!
//! ```
//! use bloomforge::hash::{digest, mulx64_mix, FnvHashBuilder, XxHashBuilder};
//! use std::hash::BuildHasher;
//!
//! let xx = XxHashBuilder::new();
//! # #[cfg(target_pointer_width = "64")]
//! assert_eq!(digest(&xx, &5u64), xx.hash_one(5u64));
//!
//! let fnv = FnvHashBuilder;
//! assert_eq!(digest(&fnv, &5u64), mulx64_mix(fnv.hash_one(5u64)));
//! ```

pub mod hasher;
pub mod mix;
pub mod xxhash;

pub use hasher::{Avalanching, FnvHashBuilder, FnvHasher, HashQuality};
pub use mix::{mulx64, mulx64_mix};
pub use xxhash::XxHashBuilder;

use std::hash::Hash;

/// Hash builder used by filters unless another is specified.
pub type DefaultHashBuilder = XxHashBuilder;

/// Whether digests from `H` are used without mixing on this target.
#[inline(always)]
#[must_use]
pub const fn uses_raw_digest<H: HashQuality>() -> bool {
    H::IS_AVALANCHING && usize::BITS >= 64
}

/// Compute the 64-bit digest a filter uses for `value`.
#[inline]
pub fn digest<H, Q>(hasher: &H, value: &Q) -> u64
where
    H: HashQuality,
    Q: Hash + ?Sized,
{
    let h = hasher.hash_one(value);
    if uses_raw_digest::<H>() {
        h
    } else {
        mulx64_mix(h)
    }
}
