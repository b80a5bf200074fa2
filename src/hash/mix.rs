//! Extended-multiplication mixing.
//!
//! `mulx64` multiplies two 64-bit values into a 128-bit product and folds the halves
//! together with XOR. With a fixed odd multiplier it is a cheap, well avalanching mixer,
//! used in three places:
//!
//! - conditioning digests from hash functions not known to avalanche,
//! - re-mixing a hash when a block subfilter runs out of hash bits,
//! - stepping between groups of eight lanes in the SIMD subfilter.

/// Golden-ratio multiplier used by [`mulx64_mix`].
pub const MULX64_MIX_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// Full 64x64 → 128 multiplication, returned as `(high, low)`.
#[inline(always)]
#[must_use]
pub const fn mulx64_wide(a: u64, b: u64) -> (u64, u64) {
    let r = (a as u128).wrapping_mul(b as u128);
    ((r >> 64) as u64, r as u64)
}

/// Multiply as 128 bits, then XOR the high and low halves.
///
/// ```text
/// mulx64(a, b) = let r = a × b as u128
///                in (r >> 64) ⊕ (r & 0xFFFF_FFFF_FFFF_FFFF)
/// ```
#[inline(always)]
#[must_use]
pub const fn mulx64(a: u64, b: u64) -> u64 {
    let (hi, lo) = mulx64_wide(a, b);
    hi ^ lo
}

/// Mix a 64-bit value with the fixed golden-ratio multiplier.
///
/// # Examples
///
/// ```
/// use bloomforge::hash::mulx64_mix;
///
/// assert_ne!(mulx64_mix(1), mulx64_mix(2));
/// assert_eq!(mulx64_mix(42), mulx64_mix(42));
/// ```
#[inline(always)]
#[must_use]
pub const fn mulx64_mix(x: u64) -> u64 {
    mulx64(x, MULX64_MIX_MULTIPLIER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mulx64_wide_matches_u128() {
        let (hi, lo) = mulx64_wide(u64::MAX, u64::MAX);
        let r = u128::from(u64::MAX) * u128::from(u64::MAX);
        assert_eq!(hi, (r >> 64) as u64);
        assert_eq!(lo, r as u64);
    }

    #[test]
    fn test_mulx64_zero() {
        assert_eq!(mulx64(0, 12345), 0);
        assert_eq!(mulx64_mix(0), 0);
    }

    #[test]
    fn test_mix_spreads_sequential_inputs() {
        // Sequential integers should land in both halves of the output space.
        let high_bits_set = (0..1000u64)
            .map(mulx64_mix)
            .filter(|h| h >> 63 == 1)
            .count();
        assert!(high_bits_set > 400 && high_bits_set < 600, "{high_bits_set}");
    }

    #[test]
    fn test_mix_avalanche() {
        let mut total = 0u32;
        for i in 0..64 {
            let a = mulx64_mix(0x0123_4567_89AB_CDEF);
            let b = mulx64_mix(0x0123_4567_89AB_CDEF ^ (1 << i));
            total += (a ^ b).count_ones();
        }
        let avg = f64::from(total) / 64.0;
        assert!(avg > 16.0 && avg < 48.0, "average flipped bits {avg}");
    }
}
