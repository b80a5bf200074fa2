//! One bit per word across `K` consecutive words.

use super::{bit_set_probability, for_each_subhash, BlockWord, Subfilter};
use std::marker::PhantomData;

/// Sets one bit in each of `K` consecutive words of type `W` per probe.
///
/// Spreads a probe's bits over a wider block than [`Block`](super::Block), which lowers
/// the false positive rate for the same `K` at the cost of touching more memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Multiblock<W, const K: usize>(PhantomData<W>);

// SAFETY: arrays of primitive unsigned integers have no padding or invalid values.
unsafe impl<W: BlockWord, const K: usize> Subfilter for Multiblock<W, K> {
    type Block = [W; K];

    const K: usize = K;
    const EMPTY_BLOCK: [W; K] = [W::ZERO; K];

    #[inline(always)]
    fn mark(block: &mut [W; K], hash: u64) {
        for_each_subhash(K, W::SHIFT, hash, |i, h| {
            block[i] |= W::bit(h);
            true
        });
    }

    #[inline(always)]
    fn check(block: &[W; K], hash: u64) -> bool {
        for_each_subhash(K, W::SHIFT, hash, |i, h| {
            let bit = W::bit(h);
            (block[i] & bit) == bit
        })
    }

    fn fpr(load: f64) -> f64 {
        bit_set_probability(W::WIDTH, load).powi(K as i32)
    }
}
