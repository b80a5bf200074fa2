//! Classic bit-set block.

use super::{bit_set_probability, for_each_subhash, BlockWord, Subfilter};
use std::marker::PhantomData;

/// Sets `K` bits inside a single word of type `W` per probe.
///
/// With `W = u8` and `K = 1` this is the textbook Bloom filter at bucket granularity:
/// each probe sets one bit of one byte.
///
/// # Examples
///
/// ```
/// use bloomforge::subfilter::{Block, Subfilter};
///
/// let mut word = <Block<u64, 4> as Subfilter>::EMPTY_BLOCK;
/// Block::<u64, 4>::mark(&mut word, 0xDEAD_BEEF_0000_1234);
/// assert!(word.count_ones() >= 1 && word.count_ones() <= 4);
/// assert!(Block::<u64, 4>::check(&word, 0xDEAD_BEEF_0000_1234));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Block<W, const K: usize>(PhantomData<W>);

// SAFETY: `BlockWord` is only implemented for primitive unsigned integers.
unsafe impl<W: BlockWord, const K: usize> Subfilter for Block<W, K> {
    type Block = W;

    const K: usize = K;
    const EMPTY_BLOCK: W = W::ZERO;

    #[inline(always)]
    fn mark(block: &mut W, hash: u64) {
        for_each_subhash(K, W::SHIFT, hash, |_, h| {
            *block |= W::bit(h);
            true
        });
    }

    #[inline(always)]
    fn check(block: &W, hash: u64) -> bool {
        let mut fingerprint = W::ZERO;
        for_each_subhash(K, W::SHIFT, hash, |_, h| {
            fingerprint |= W::bit(h);
            true
        });
        (*block & fingerprint) == fingerprint
    }

    fn fpr(load: f64) -> f64 {
        bit_set_probability(W::WIDTH, load * K as f64).powi(K as i32)
    }
}
