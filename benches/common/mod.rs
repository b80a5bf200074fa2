//! Shared data generators and constants for benchmarks.
//!
//! This module provides:
//! - Reproducible data generators (integers, strings)
//! - Common benchmark constants (sizes, target rates)
//!
//! Generators are seeded so every run measures the same workload.
#![allow(dead_code)]

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Items inserted per filter.
pub const SIZES: &[usize] = &[10_000, 100_000, 1_000_000];

/// Target false positive rates.
pub const FP_RATES: &[f64] = &[0.01, 0.001, 0.0001];

/// Target rate used when only the layout varies.
pub const DEFAULT_FPR: f64 = 0.01;

/// Generate `count` pseudo-random integers from `seed`.
pub fn generate_u64s(count: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen()).collect()
}

/// Generate `count` alphanumeric strings of length `len` from `seed`.
///
/// # Examples
/// ```ignore
/// let items = generate_strings(1000, 32, 7);
/// assert_eq!(items.len(), 1000);
/// ```
pub fn generate_strings(count: usize, len: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (&mut rng).sample_iter(&Alphanumeric).take(len).map(char::from).collect())
        .collect()
}

/// Format a rate for benchmark ids: `0.001` becomes `"0.1%"`.
pub fn format_rate(fpr: f64) -> String {
    format!("{}%", fpr * 100.0)
}
