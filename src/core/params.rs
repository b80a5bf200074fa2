//! Capacity planning math.
//!
//! # Mathematical Background
//!
//! Given:
//! - `n`: Expected number of elements
//! - `ε`: Target false positive rate
//!
//! The textbook Bloom filter with a free choice of hash count needs
//!
//! - `m = -n × ln(ε) / (ln 2)²` bits,
//!
//! and has false positive rate `p = (1 - e^(-kn/m))^k` for `k` hash functions.
//!
//! Filters in this crate fix `k` at compile time and may confine each probe to a small
//! block, so the textbook formula under- or overestimates their real rate. Sizing instead
//! models the number of marks landing on the block a query inspects as a Poisson variable
//! with mean `λ`, and averages the subfilter's per-block rate over it:
//!
//! ```text
//! FPR = ( Σ_i Pois(i; λ) × fpr_block(i) )^k
//! ```
//!
//! The bits per element achieving a target rate are then found numerically.
//!
//! # References
//!
//! - Bloom, Burton H. (1970). "Space/Time Trade-offs in Hash Coding with Allowable Errors"
//! - Putze, Sanders & Singler (2007). "Cache-, Hash- and Space-Efficient Bloom Filters"

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use crate::error::{BloomError, Result};
use std::f64::consts::LN_2;

/// Mathematical constant: (ln 2)² ≈ 0.4804530139182014
pub const LN2_SQUARED: f64 = LN_2 * LN_2;

/// Above this mean the Poisson mixture is replaced by its value at the mean.
const POISSON_EXACT_LIMIT: f64 = 1e4;

/// Doublings allowed while bracketing the bits-per-element solution.
const MAX_DOUBLINGS: u32 = 64;

/// Relative width at which bisection stops.
const BISECTION_TOLERANCE: f64 = 1e-9;

/// Calculate optimal number of bits for given constraints.
///
/// Implements the formula: `m = -n × ln(ε) / (ln 2)²`
///
/// # Arguments
///
/// * `n` - Expected number of elements
/// * `fp_rate` - Target false positive rate
///
/// # Returns
///
/// * `Ok(0)` - If `n == 0` or `fp_rate >= 1`
/// * `Ok(usize)` - Number of bits, rounded up
///
/// # Errors
///
/// - [`BloomError::InvalidFalsePositiveRate`] if `fp_rate` is NaN
/// - [`BloomError::CapacityOverflow`] if `fp_rate <= 0` or the result exceeds `usize`
///
/// # Examples
///
/// ```
/// use bloomforge::core::params::optimal_bit_count;
///
/// // For 1000 items with 1% false positive rate
/// let bits = optimal_bit_count(1000, 0.01).unwrap();
/// assert!(bits >= 9585 && bits <= 9586);
///
/// assert_eq!(optimal_bit_count(0, 0.01).unwrap(), 0);
/// ```
pub fn optimal_bit_count(n: usize, fp_rate: f64) -> Result<usize> {
    if fp_rate.is_nan() {
        return Err(BloomError::invalid_fpr(fp_rate));
    }
    if n == 0 || fp_rate >= 1.0 {
        return Ok(0);
    }
    if fp_rate <= 0.0 {
        return Err(BloomError::capacity_overflow(format!(
            "false positive rate {fp_rate} needs unbounded capacity"
        )));
    }

    let m = (-(n as f64) * fp_rate.ln() / LN2_SQUARED).ceil();
    if m >= usize::MAX as f64 {
        return Err(BloomError::capacity_overflow(format!(
            "calculated filter size {m:.0} exceeds usize::MAX"
        )));
    }
    Ok(m as usize)
}

/// Calculate expected false positive rate for the textbook filter.
///
/// Implements the formula: `p = (1 - e^(-kn/m))^k`
///
/// # Examples
///
/// ```
/// use bloomforge::core::params::expected_fp_rate;
///
/// let fp = expected_fp_rate(9585, 1000, 7);
/// assert!((fp - 0.01).abs() < 0.001);
/// ```
#[must_use]
pub fn expected_fp_rate(m: usize, n: usize, k: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    if m == 0 {
        return 1.0;
    }
    let k_f64 = k as f64;
    let prob_bit_one = 1.0 - (-(k_f64 * n as f64) / m as f64).exp();
    prob_bit_one.powf(k_f64).clamp(0.0, 1.0)
}

/// `E[f(X)]` for `X ~ Poisson(lambda)`.
///
/// Terms are summed up to `λ + 12√λ + 12`, past which the remaining probability mass is
/// negligible. For very large `λ` the distribution is concentrated enough that `f(λ)`
/// is returned directly.
#[must_use]
pub fn poisson_mixture<F>(lambda: f64, f: F) -> f64
where
    F: Fn(f64) -> f64,
{
    if lambda <= 0.0 {
        return f(0.0);
    }
    if lambda > POISSON_EXACT_LIMIT {
        return f(lambda);
    }

    let end = (lambda + 12.0 * lambda.sqrt() + 12.0).ceil() as usize;
    let ln_lambda = lambda.ln();
    let mut ln_factorial = 0.0;
    let mut sum = 0.0;
    for i in 0..=end {
        let x = i as f64;
        if i > 0 {
            ln_factorial += x.ln();
        }
        let ln_p = x * ln_lambda - lambda - ln_factorial;
        sum += ln_p.exp() * f(x);
    }
    sum.clamp(0.0, 1.0)
}

/// Smallest bits per element `c` with `fpr_at(c) <= target`.
///
/// `fpr_at` must be non-increasing. The search starts from the textbook value
/// `-ln(target) / (ln 2)²`, doubles until the target is met and then bisects.
///
/// # Errors
///
/// [`BloomError::CapacityOverflow`] if no representable `c` meets the target.
pub fn min_bits_per_item<F>(target: f64, fpr_at: F) -> Result<f64>
where
    F: Fn(f64) -> f64,
{
    let mut hi = (-target.ln() / LN2_SQUARED).max(1.0);
    let mut doublings = 0;
    while fpr_at(hi) > target {
        doublings += 1;
        hi *= 2.0;
        if doublings > MAX_DOUBLINGS || !hi.is_finite() {
            return Err(BloomError::capacity_overflow(format!(
                "false positive rate {target} is not reachable"
            )));
        }
    }

    let mut lo = 0.0;
    while hi - lo > BISECTION_TOLERANCE * hi {
        let mid = 0.5 * (lo + hi);
        if fpr_at(mid) <= target {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Ok(hi)
}
