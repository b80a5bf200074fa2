//! In-bucket marking algorithms.
//!
//! A subfilter decides what one probe does to the bucket it lands on. It owns a
//! fixed-size block type read from and written to the bucket array, and sets or tests a
//! fixed number of bits inside that block for every probe.
//!
//! | Subfilter                   | Block      | Bits per probe          |
//! |-----------------------------|------------|-------------------------|
//! | [`Block<W, K>`]             | `W`        | `K` bits in one word    |
//! | [`Multiblock<W, K>`]        | `[W; K]`   | one bit in each of `K` words |
//! | [`FastMultiblock32<K>`]     | `[u32; K]` | one bit in each of `K` lanes, vectorized |
//!
//! All variants are monotonic: `mark` only sets bits and `check` only asks whether the
//! bits `mark` would set are present. This is what makes bytewise union and
//! intersection of two filters sound.

mod block;
mod fast_multiblock32;
mod multiblock;

pub use block::Block;
pub use fast_multiblock32::FastMultiblock32;
pub use multiblock::Multiblock;

use crate::hash::mulx64_mix;
use std::fmt::Debug;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Bucket marking algorithm.
///
/// # Safety
///
/// Blocks are read from and written to raw bucket memory, possibly at addresses only
/// aligned to one byte. `Block` must therefore have no padding and every bit pattern
/// must be a valid value, and `USED_SIZE` must not exceed `size_of::<Block>()`.
pub unsafe trait Subfilter {
    /// In-memory representation of one bucket's bits.
    type Block: Copy;

    /// Number of bits set in the block per probe.
    const K: usize;

    /// Leading bytes of the block actually read or written.
    const USED_SIZE: usize = std::mem::size_of::<Self::Block>();

    /// A block with no bits set.
    const EMPTY_BLOCK: Self::Block;

    /// Set the bits selected by `hash`.
    fn mark(block: &mut Self::Block, hash: u64);

    /// Whether every bit `mark` would set for `hash` is already set.
    fn check(block: &Self::Block, hash: u64) -> bool;

    /// Probability that `check` passes for a random hash on a block that has received
    /// `load` marks. `load` may be fractional.
    fn fpr(load: f64) -> f64;
}

mod sealed {
    pub trait Sealed {}
}

/// Unsigned integer usable as a subfilter word.
pub trait BlockWord:
    sealed::Sealed
    + Copy
    + Eq
    + Debug
    + Send
    + Sync
    + 'static
    + BitOr<Output = Self>
    + BitOrAssign
    + BitAnd<Output = Self>
{
    /// All bits clear.
    const ZERO: Self;
    /// `log2` of the bit width; the number of hash bits one probe consumes.
    const SHIFT: u32;
    /// Bit width.
    const WIDTH: u32;

    /// The single bit selected by the low `SHIFT` bits of `h`.
    fn bit(h: u64) -> Self;
}

macro_rules! impl_block_word {
    ($($t:ty),* $(,)?) => {$(
        impl sealed::Sealed for $t {}

        impl BlockWord for $t {
            const ZERO: Self = 0;
            const SHIFT: u32 = <$t>::BITS.trailing_zeros();
            const WIDTH: u32 = <$t>::BITS;

            #[inline(always)]
            fn bit(h: u64) -> Self {
                1 << (h & u64::from(<$t>::BITS - 1))
            }
        }
    )*};
}

impl_block_word!(u8, u16, u32, u64);

/// Feed `k` sub-hashes of `shift` bits each to `f`, stopping early when it returns false.
///
/// Sub-hashes are taken from successively higher bits of `hash`, skipping the lowest
/// `shift` bits. When the 64 bits run out the hash is re-mixed with [`mulx64_mix`] and
/// consumption restarts. `f` receives the probe index and the shifted hash; only its low
/// `shift` bits are meaningful.
#[inline(always)]
pub(crate) fn for_each_subhash<F>(k: usize, shift: u32, mut hash: u64, mut f: F) -> bool
where
    F: FnMut(usize, u64) -> bool,
{
    let per_hash = ((64 - shift) / shift) as usize;
    let mut i = 0;
    while i < k {
        let mut h = hash;
        let end = k.min(i + per_hash);
        while i < end {
            h >>= shift;
            if !f(i, h) {
                return false;
            }
            i += 1;
        }
        hash = mulx64_mix(hash);
    }
    true
}

/// `(1 - (1 - 1/width)^marks)`: chance that a given bit is set after `marks` random bit
/// sets in a word of `width` bits.
#[inline]
pub(crate) fn bit_set_probability(width: u32, marks: f64) -> f64 {
    1.0 - (1.0 - 1.0 / f64::from(width)).powf(marks)
}
