//! Vectorized multiblock over 32-bit lanes.
//!
//! Each probe sets one bit in each of `K` 32-bit lanes. Lanes are processed in groups of
//! eight (two 128-bit registers); the hash is re-mixed with
//! [`mulx64_mix`](crate::hash::mulx64_mix) between groups.
//!
//! # Lane construction
//!
//! Eight 32-bit lane words are cut from one 64-bit hash `h` and from `s = h << 5`:
//!
//! ```text
//! lane  0: low32(h)          lane 4: low32(h << 16)
//! lane  1: high32(h)         lane 5: low32(h >> 16)
//! lane  2: low32(s)          lane 6: low32((s << 16) | (h >> 48))
//! lane  3: high32(s)         lane 7: low32(s >> 16)
//! ```
//!
//! Bits 23..28 of each lane word pick the bit to set in that lane. The SSE2 path
//! materializes `1 << e` without a variable shift by writing `127 + e` into the exponent
//! field of an IEEE-754 single, which encodes `2^e`, and truncating it back to an
//! integer. `2^31` overflows the conversion into `0x8000_0000`, which is the wanted bit.
//! Lanes beyond the group's probe count get an exponent that truncates to zero.
//!
//! The portable path computes the same bits with plain shifts and is compiled on every
//! target; with the `simd` feature on x86_64 the SSE2 path is used instead.

use super::{bit_set_probability, Subfilter};
use crate::hash::mulx64_mix;

/// Sets one bit in each of `K` 32-bit lanes per probe, eight lanes at a time.
///
/// # Examples
///
/// ```
/// use bloomforge::subfilter::{FastMultiblock32, Subfilter};
///
/// let mut lanes = [0u32; 11];
/// FastMultiblock32::<11>::mark(&mut lanes, 0x0123_4567_89AB_CDEF);
/// assert!(lanes.iter().all(|w| w.count_ones() == 1));
/// assert!(FastMultiblock32::<11>::check(&lanes, 0x0123_4567_89AB_CDEF));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FastMultiblock32<const K: usize>;

const GROUP: usize = 8;

// SAFETY: `[u32; K]` has no padding or invalid values.
unsafe impl<const K: usize> Subfilter for FastMultiblock32<K> {
    type Block = [u32; K];

    const K: usize = K;
    const EMPTY_BLOCK: [u32; K] = [0; K];

    #[inline(always)]
    fn mark(block: &mut [u32; K], mut hash: u64) {
        let ptr = block.as_mut_ptr();
        for g in 0..K / GROUP {
            // SAFETY: group `g` spans lanes 8g..8g+8, all below K.
            unsafe { group::mark(ptr.add(g * GROUP), hash, GROUP) };
            hash = mulx64_mix(hash);
        }
        let rest = K % GROUP;
        if rest != 0 {
            let base = K - rest;
            let mut staged = [0u32; GROUP];
            staged[..rest].copy_from_slice(&block[base..]);
            // SAFETY: `staged` holds a full group.
            unsafe { group::mark(staged.as_mut_ptr(), hash, rest) };
            block[base..].copy_from_slice(&staged[..rest]);
        }
    }

    #[inline(always)]
    fn check(block: &[u32; K], mut hash: u64) -> bool {
        let ptr = block.as_ptr();
        for g in 0..K / GROUP {
            // SAFETY: group `g` spans lanes 8g..8g+8, all below K.
            if !unsafe { group::check(ptr.add(g * GROUP), hash, GROUP) } {
                return false;
            }
            hash = mulx64_mix(hash);
        }
        let rest = K % GROUP;
        if rest != 0 {
            let mut staged = [0u32; GROUP];
            staged[..rest].copy_from_slice(&block[K - rest..]);
            // SAFETY: `staged` holds a full group.
            return unsafe { group::check(staged.as_ptr(), hash, rest) };
        }
        true
    }

    fn fpr(load: f64) -> f64 {
        bit_set_probability(32, load).powi(K as i32)
    }
}

/// Lane words for one group, in lane order.
#[cfg_attr(all(feature = "simd", target_arch = "x86_64"), allow(dead_code))]
#[inline(always)]
fn lane_words(hash: u64) -> [u32; GROUP] {
    let s = hash << 5;
    [
        hash as u32,
        (hash >> 32) as u32,
        s as u32,
        (s >> 32) as u32,
        (hash << 16) as u32,
        (hash >> 16) as u32,
        ((s << 16) | (hash >> 48)) as u32,
        (s >> 16) as u32,
    ]
}

/// One-hot lane masks for the first `kp` lanes of a group; the rest are zero.
#[cfg_attr(all(feature = "simd", target_arch = "x86_64"), allow(dead_code))]
#[inline(always)]
fn lane_masks(hash: u64, kp: usize) -> [u32; GROUP] {
    let words = lane_words(hash);
    let mut masks = [0u32; GROUP];
    for (mask, word) in masks.iter_mut().zip(words).take(kp) {
        *mask = 1 << ((word >> 23) & 31);
    }
    masks
}

#[cfg_attr(all(feature = "simd", target_arch = "x86_64"), allow(dead_code))]
mod scalar {
    use super::{lane_masks, GROUP};

    /// # Safety
    ///
    /// `lanes` must be valid for reads and writes of eight `u32`.
    #[inline(always)]
    pub(super) unsafe fn mark(lanes: *mut u32, hash: u64, kp: usize) {
        let masks = lane_masks(hash, kp);
        for (j, mask) in masks.iter().enumerate().take(kp) {
            // SAFETY: j < kp <= GROUP, within the caller's eight lanes.
            unsafe { *lanes.add(j) |= mask };
        }
    }

    /// # Safety
    ///
    /// `lanes` must be valid for reads of eight `u32`.
    #[inline(always)]
    pub(super) unsafe fn check(lanes: *const u32, hash: u64, kp: usize) -> bool {
        let masks = lane_masks(hash, kp);
        (0..kp.min(GROUP)).all(|j| {
            // SAFETY: j < GROUP, within the caller's eight lanes.
            let lane = unsafe { *lanes.add(j) };
            lane & masks[j] == masks[j]
        })
    }
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod sse2 {
    use std::arch::x86_64::*;

    const MASK: i32 = (31u32 << 23) as i32;
    const EXP: i32 = (127u32 << 23) as i32;

    /// Exponent bias in the first `n` lanes, zero elsewhere.
    #[inline(always)]
    unsafe fn exps(n: usize) -> __m128i {
        match n {
            1 => _mm_set_epi32(0, 0, 0, EXP),
            2 => _mm_set_epi32(0, 0, EXP, EXP),
            3 => _mm_set_epi32(0, EXP, EXP, EXP),
            _ => _mm_set1_epi32(EXP),
        }
    }

    #[inline(always)]
    unsafe fn pow2(x: __m128i) -> __m128i {
        _mm_cvttps_epi32(_mm_castsi128_ps(x))
    }

    #[inline(always)]
    unsafe fn make(hash: u64, kp: usize) -> (__m128i, __m128i) {
        let mask = _mm_set1_epi32(MASK);
        let h_lo = _mm_set_epi64x((hash << 5) as i64, hash as i64);
        if kp <= 4 {
            let lo = _mm_add_epi32(_mm_and_si128(h_lo, mask), exps(kp));
            (pow2(lo), _mm_setzero_si128())
        } else {
            let h_hi = _mm_slli_si128::<2>(h_lo);
            let lo = _mm_add_epi32(_mm_and_si128(h_lo, mask), _mm_set1_epi32(EXP));
            let hi = _mm_add_epi32(_mm_and_si128(h_hi, mask), exps(kp - 4));
            (pow2(lo), pow2(hi))
        }
    }

    /// Whether every bit of `h` is set in `x`.
    #[inline(always)]
    unsafe fn contains(x: __m128i, h: __m128i) -> bool {
        _mm_movemask_epi8(_mm_cmpeq_epi32(_mm_and_si128(x, h), h)) == 0xFFFF
    }

    /// # Safety
    ///
    /// `lanes` must be valid for reads and writes of eight `u32`.
    #[inline(always)]
    pub(super) unsafe fn mark(lanes: *mut u32, hash: u64, kp: usize) {
        // SAFETY: SSE2 is part of the x86_64 baseline; loads and stores are unaligned
        // and stay within the caller's eight lanes.
        unsafe {
            let (h_lo, h_hi) = make(hash, kp);
            let lo = lanes.cast::<__m128i>();
            _mm_storeu_si128(lo, _mm_or_si128(_mm_loadu_si128(lo), h_lo));
            if kp > 4 {
                let hi = lanes.add(4).cast::<__m128i>();
                _mm_storeu_si128(hi, _mm_or_si128(_mm_loadu_si128(hi), h_hi));
            }
        }
    }

    /// # Safety
    ///
    /// `lanes` must be valid for reads of eight `u32`.
    #[inline(always)]
    pub(super) unsafe fn check(lanes: *const u32, hash: u64, kp: usize) -> bool {
        // SAFETY: as in `mark`, read-only.
        unsafe {
            let (h_lo, h_hi) = make(hash, kp);
            if !contains(_mm_loadu_si128(lanes.cast::<__m128i>()), h_lo) {
                return false;
            }
            kp <= 4 || contains(_mm_loadu_si128(lanes.add(4).cast::<__m128i>()), h_hi)
        }
    }
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
use sse2 as group;

#[cfg(not(all(feature = "simd", target_arch = "x86_64")))]
use scalar as group;
