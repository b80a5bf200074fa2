//! Bucket position generation.
//!
//! One 64-bit digest seeds a sequence of `K` bucket positions with no further hashing:
//!
//! ```text
//! x    = hash × rng              (128-bit product)
//! pos  = high(x)                 uniform in [0, rng)
//! hash = low(x)                  next generator state
//! ```
//!
//! `pos` is the multiply-high range reduction of the current state. The state update
//! `hash ← hash × rng mod 2^64` is a multiplicative congruential generator, which cycles
//! with maximal period when the seed is odd and `rng ≡ ±3 (mod 8)`; construction nudges
//! the range upward to satisfy the latter and [`McgFastRange::prepare_hash`] forces the
//! former. The low bits of the state are weak as a consequence (the least significant
//! bit is always one), so subfilters skip past them before drawing their own bits.

use crate::hash::mix::mulx64_wide;

/// Multiplicative congruential generator combined with fast range reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct McgFastRange {
    rng: u64,
}

impl McgFastRange {
    /// Create a generator over at least `buckets` positions.
    ///
    /// The range is `buckets` rounded up to the nearest value congruent to 3 or 5 modulo 8.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::core::McgFastRange;
    ///
    /// assert_eq!(McgFastRange::new(0).range(), 3);
    /// assert_eq!(McgFastRange::new(4).range(), 5);
    /// assert_eq!(McgFastRange::new(6).range(), 11);
    /// ```
    #[must_use]
    pub const fn new(buckets: usize) -> Self {
        let r = buckets % 8;
        let bump = if r <= 3 {
            3 - r
        } else if r <= 5 {
            5 - r
        } else {
            8 - r + 3
        };
        Self {
            rng: buckets.saturating_add(bump) as u64,
        }
    }

    /// Number of distinct positions produced.
    #[inline(always)]
    #[must_use]
    pub const fn range(&self) -> usize {
        self.rng as usize
    }

    /// Turn a digest into a valid generator seed.
    #[inline(always)]
    pub fn prepare_hash(&self, hash: &mut u64) {
        *hash |= 1;
    }

    /// Produce the next position and advance `hash`.
    #[inline(always)]
    pub fn next_position(&self, hash: &mut u64) -> usize {
        let (hi, lo) = mulx64_wide(*hash, self.rng);
        *hash = lo;
        hi as usize
    }
}
