//! XXH3 hash builder.
//!
//! Wraps the `xxhash-rust` crate's streaming XXH3 state as a [`BuildHasher`], giving
//! filters a fast, seedable and deterministic default hash function. XXH3 avalanches,
//! so digests are used without further mixing on 64-bit targets.

use super::hasher::HashQuality;
use std::hash::BuildHasher;
use xxhash_rust::xxh3::Xxh3;

/// [`BuildHasher`] producing seeded XXH3 hashers.
///
/// # Examples
///
/// ```
/// use bloomforge::hash::XxHashBuilder;
/// use std::hash::BuildHasher;
///
/// let builder = XxHashBuilder::new();
/// assert_eq!(builder.hash_one("hello"), builder.hash_one("hello"));
///
/// let seeded = XxHashBuilder::with_seed(42);
/// assert_ne!(builder.hash_one("hello"), seeded.hash_one("hello"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct XxHashBuilder {
    seed: u64,
}

impl XxHashBuilder {
    /// Create a builder with seed 0.
    #[must_use]
    pub const fn new() -> Self {
        Self { seed: 0 }
    }

    /// Create a builder with an explicit seed.
    #[must_use]
    pub const fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// The seed handed to every hasher this builder creates.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

impl BuildHasher for XxHashBuilder {
    type Hasher = Xxh3;

    #[inline]
    fn build_hasher(&self) -> Xxh3 {
        Xxh3::with_seed(self.seed)
    }
}

impl HashQuality for XxHashBuilder {
    const IS_AVALANCHING: bool = true;
}
