//! The probe loop.
//!
//! [`FilterCore`] composes a bucket array, the position generator addressing it and a
//! subfilter. It works on 64-bit digests only; turning values into digests is the job of
//! [`Filter`](crate::Filter).
//!
//! - `insert`: `K` positions are drawn from the digest and each bucket is marked with the
//!   generator state current at that step.
//! - `may_contain`: the same `K` buckets are checked, stopping at the first miss. The
//!   next bucket is computed (and prefetched) before the current one is checked, so
//!   memory latency overlaps with the comparison.
//!
//! Blocks are accessed in place when every bucket start is aligned for the subfilter's
//! block type and the whole block is in use. Otherwise the used bytes are staged
//! through a local block.

use super::params;
use super::storage::{ArrayShape, FilterStorage};
use crate::alloc::FilterAllocator;
use crate::error::{BloomError, Result};
use crate::subfilter::Subfilter;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};

const CACHELINE: usize = 64;

/// Bucket geometry derived from a subfilter and a bucket size (`0` = the subfilter's
/// used size).
pub struct Shape<S, const B: usize>(PhantomData<S>);

impl<S: Subfilter, const B: usize> Shape<S, B> {
    /// Bytes of the subfilter block actually touched.
    pub const USED_SIZE: usize = S::USED_SIZE;
    /// Full in-memory size of a block.
    pub const BLOCK_SIZE: usize = size_of::<S::Block>();
    /// Whether every bucket start is aligned for the block type.
    pub const BLOCKS_ALIGNED: bool = Self::BUCKET % align_of::<S::Block>() == 0;
    /// Whether blocks can be referenced directly inside the array.
    pub const IN_PLACE: bool = Self::BLOCKS_ALIGNED && Self::USED_SIZE == Self::BLOCK_SIZE;
    /// Cache lines spanned by one block access, in the worst case.
    pub const PREFETCHED_CACHELINES: usize =
        1 + (Self::USED_SIZE + CACHELINE - 1 - gcd_pow2(Self::BUCKET, CACHELINE)) / CACHELINE;

    const BUCKET: usize = if B == 0 { S::USED_SIZE } else { B };
}

impl<S: Subfilter, const B: usize> ArrayShape for Shape<S, B> {
    const BUCKET_SIZE: usize = Self::BUCKET;
    const TAIL_SIZE: usize = Self::BLOCK_SIZE.saturating_sub(Self::BUCKET);
    const ALIGNMENT: usize = if Self::BLOCKS_ALIGNED {
        if align_of::<S::Block>() > CACHELINE {
            align_of::<S::Block>()
        } else {
            CACHELINE
        }
    } else {
        1
    };
}

/// Largest power of two dividing both `a` and the power of two `pow2`.
const fn gcd_pow2(a: usize, pow2: usize) -> usize {
    let low = a & a.wrapping_neg();
    if low == 0 || low > pow2 {
        pow2
    } else {
        low
    }
}

#[inline(always)]
fn prefetch(ptr: *const u8, lines: usize) {
    #[cfg(all(target_arch = "x86_64", target_feature = "sse"))]
    {
        use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
        for i in 0..lines {
            // SAFETY: prefetching never faults, whatever the address.
            unsafe { _mm_prefetch::<_MM_HINT_T0>(ptr.wrapping_add(i * CACHELINE).cast::<i8>()) };
        }
    }
    #[cfg(not(all(target_arch = "x86_64", target_feature = "sse")))]
    let _ = (ptr, lines);
}

/// Digest-level filter engine.
pub struct FilterCore<const K: usize, S: Subfilter, const B: usize, A: FilterAllocator> {
    storage: FilterStorage<Shape<S, B>, A>,
}

impl<const K: usize, S: Subfilter, const B: usize, A: FilterAllocator> FilterCore<K, S, B, A> {
    const VALID: () = {
        assert!(K > 0, "a filter needs at least one probe per item");
        assert!(S::K > 0, "a subfilter must set at least one bit per probe");
        assert!(S::USED_SIZE <= size_of::<S::Block>());
    };

    /// Bytes between consecutive buckets.
    pub const BUCKET_SIZE: usize = <Shape<S, B> as ArrayShape>::BUCKET_SIZE;

    /// Zeroed engine with room for at least `bits` bits.
    ///
    /// # Errors
    ///
    /// Fails if the array cannot be sized or allocated.
    pub fn new_in(bits: usize, alloc: A) -> Result<Self> {
        let () = Self::VALID;
        Ok(Self {
            storage: FilterStorage::new_in(bits, alloc)?,
        })
    }

    /// Zero-capacity engine.
    #[must_use]
    pub fn empty_in(alloc: A) -> Self {
        let () = Self::VALID;
        Self {
            storage: FilterStorage::empty_in(alloc),
        }
    }

    /// Deep copy backed by `alloc`.
    ///
    /// # Errors
    ///
    /// Fails if the copy cannot be allocated.
    pub fn try_clone_in(&self, alloc: A) -> Result<Self> {
        Ok(Self {
            storage: self.storage.try_clone_in(alloc)?,
        })
    }

    /// Move out, leaving `self` with zero capacity.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            storage: self.storage.take(),
        }
    }

    /// Move into an engine bound to `alloc`, leaving `self` with zero capacity.
    ///
    /// # Errors
    ///
    /// Fails if the contents must be copied and the copy cannot be allocated.
    pub fn take_in(&mut self, alloc: A) -> Result<Self> {
        Ok(Self {
            storage: self.storage.take_in(alloc)?,
        })
    }

    /// Copy-assign from `source`.
    ///
    /// # Errors
    ///
    /// Fails if a new array is needed and cannot be allocated.
    pub fn assign_from(&mut self, source: &Self) -> Result<()> {
        self.storage.assign_from(&source.storage)
    }

    /// Move-assign from `source`, leaving it with zero capacity.
    ///
    /// # Errors
    ///
    /// Fails if the contents must be copied and the copy cannot be allocated.
    pub fn assign_take(&mut self, source: &mut Self) -> Result<()> {
        self.storage.assign_take(&mut source.storage)
    }

    /// Exchange contents with `other`.
    ///
    /// # Panics
    ///
    /// See [`FilterStorage::swap`].
    pub fn swap(&mut self, other: &mut Self) {
        self.storage.swap(&mut other.storage);
    }

    /// Unset every bit.
    pub fn clear(&mut self) {
        self.storage.clear();
    }

    /// Resize for `bits` bits; the result is empty.
    ///
    /// # Errors
    ///
    /// Fails if a new array cannot be allocated; the engine is then unchanged.
    pub fn reset(&mut self, bits: usize) -> Result<()> {
        self.storage.reset(bits)
    }

    /// Number of bits in the array.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Number of buckets.
    #[inline]
    #[must_use]
    pub fn range(&self) -> usize {
        self.storage.range()
    }

    /// The allocator.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &A {
        self.storage.allocator()
    }

    /// Raw bucket bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_bytes()
    }

    #[inline(always)]
    fn next_element(&self, base: *const u8, hash: &mut u64) -> *const u8 {
        let p = self.storage.hash_strategy().next_position(hash);
        let ptr = base.wrapping_add(p * Self::BUCKET_SIZE);
        prefetch(ptr, Shape::<S, B>::PREFETCHED_CACHELINES);
        ptr
    }

    /// # Safety
    ///
    /// `ptr` must be a bucket start inside an allocated array.
    #[inline(always)]
    unsafe fn mark_at(ptr: *mut u8, hash: u64) {
        if Shape::<S, B>::IN_PLACE {
            // SAFETY: the bucket is aligned for `S::Block` and the tail covers the block.
            let block = unsafe { &mut *ptr.cast::<S::Block>() };
            S::mark(block, hash);
        } else {
            let mut block = S::EMPTY_BLOCK;
            let local = std::ptr::addr_of_mut!(block).cast::<u8>();
            // SAFETY: the array holds `USED_SIZE` bytes at every bucket start, and any
            // byte pattern is a valid block.
            unsafe { std::ptr::copy_nonoverlapping(ptr, local, S::USED_SIZE) };
            S::mark(&mut block, hash);
            // SAFETY: as above.
            unsafe { std::ptr::copy_nonoverlapping(local, ptr, S::USED_SIZE) };
        }
    }

    /// # Safety
    ///
    /// `ptr` must be a bucket start inside an allocated array or the sentinel.
    #[inline(always)]
    unsafe fn check_at(ptr: *const u8, hash: u64) -> bool {
        if Shape::<S, B>::IN_PLACE {
            // SAFETY: as in `mark_at`, read-only.
            S::check(unsafe { &*ptr.cast::<S::Block>() }, hash)
        } else {
            let mut block = S::EMPTY_BLOCK;
            // SAFETY: as in `mark_at`.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    ptr,
                    std::ptr::addr_of_mut!(block).cast::<u8>(),
                    S::USED_SIZE,
                );
            }
            S::check(&block, hash)
        }
    }

    /// Record a digest. Has no effect on a zero-capacity engine.
    #[inline]
    pub fn insert(&mut self, mut hash: u64) {
        if !self.storage.is_allocated() {
            return;
        }
        let base = self.storage.buckets().as_ptr();
        self.storage.hash_strategy().prepare_hash(&mut hash);
        for _ in 0..K {
            let ptr = self.next_element(base, &mut hash);
            // SAFETY: positions are below the range of the allocated array.
            unsafe { Self::mark_at(ptr.cast_mut(), hash) };
        }
    }

    /// Whether a digest may have been recorded. Always true at zero capacity.
    #[inline]
    #[must_use]
    pub fn may_contain(&self, mut hash: u64) -> bool {
        let base = self.storage.buckets().as_ptr().cast_const();
        self.storage.hash_strategy().prepare_hash(&mut hash);
        let mut next = self.next_element(base, &mut hash);
        for _ in 1..K {
            let current = next;
            let current_hash = hash;
            next = self.next_element(base, &mut hash);
            // SAFETY: positions are below the range of the array or of the sentinel.
            if !unsafe { Self::check_at(current, current_hash) } {
                return false;
            }
        }
        // SAFETY: as above.
        unsafe { Self::check_at(next, hash) }
    }

    fn combine(&mut self, other: &Self, op: &str, f: impl Fn(u8, u8) -> u8) -> Result<()> {
        if self.range() != other.range() {
            tracing::debug!(op, lhs = self.range(), rhs = other.range(), "range mismatch");
            return Err(BloomError::incompatible_filters(format!(
                "bucket ranges differ ({} vs {})",
                self.range(),
                other.range()
            )));
        }
        if !self
            .storage
            .allocator()
            .is_interchangeable_with(other.storage.allocator())
        {
            tracing::debug!(op, "allocator mismatch");
            return Err(BloomError::incompatible_filters(
                "allocators are not interchangeable",
            ));
        }
        for (dst, src) in self.storage.as_bytes_mut().iter_mut().zip(other.as_bytes()) {
            *dst = f(*dst, *src);
        }
        Ok(())
    }

    /// Bitwise OR with `other`.
    ///
    /// # Errors
    ///
    /// [`BloomError::IncompatibleFilters`] if the ranges or allocators differ; `self` is
    /// then unchanged.
    pub fn union(&mut self, other: &Self) -> Result<()> {
        self.combine(other, "union", |a, b| a | b)
    }

    /// Bitwise AND with `other`.
    ///
    /// # Errors
    ///
    /// [`BloomError::IncompatibleFilters`] if the ranges or allocators differ; `self` is
    /// then unchanged.
    pub fn intersect(&mut self, other: &Self) -> Result<()> {
        self.combine(other, "intersect", |a, b| a & b)
    }

    /// Bits of array spanned by the blocks that can overlap a given block, and the share
    /// of an overlapping block's marks that lands on the given block on average.
    fn window() -> (f64, f64) {
        let bucket = Self::BUCKET_SIZE;
        let used = S::USED_SIZE;
        if bucket <= used {
            let window = 2 * used - bucket;
            ((window * 8) as f64, used as f64 / window as f64)
        } else {
            ((bucket * 8) as f64, 1.0)
        }
    }

    /// False positive rate with `bits_per_item` bits of array per inserted item.
    fn fpr_at(bits_per_item: f64) -> f64 {
        if bits_per_item <= 0.0 {
            return 1.0;
        }
        let (window, share) = Self::window();
        let load = window * K as f64 / bits_per_item;
        params::poisson_mixture(load, |marks| S::fpr(marks * share)).powi(K as i32)
    }

    /// Expected false positive rate after inserting `items` distinct values into an
    /// array of `bits` bits.
    #[must_use]
    pub fn fpr_for(items: usize, bits: usize) -> f64 {
        if items == 0 {
            0.0
        } else if bits == 0 {
            1.0
        } else {
            Self::fpr_at(bits as f64 / items as f64)
        }
    }

    /// Smallest number of bits keeping the false positive rate at or below `fpr` after
    /// `items` insertions.
    ///
    /// Returns 0 when `items == 0` or `fpr >= 1`.
    ///
    /// # Errors
    ///
    /// - [`BloomError::InvalidFalsePositiveRate`] if `fpr` is NaN.
    /// - [`BloomError::CapacityOverflow`] if `fpr <= 0` with `items > 0`, or if the
    ///   required size is not representable.
    pub fn capacity_for(items: usize, fpr: f64) -> Result<usize> {
        if fpr.is_nan() {
            return Err(BloomError::invalid_fpr(fpr));
        }
        if items == 0 || fpr >= 1.0 {
            return Ok(0);
        }
        if fpr <= 0.0 {
            return Err(BloomError::capacity_overflow(format!(
                "false positive rate {fpr} for {items} items needs unbounded capacity"
            )));
        }
        let per_item = params::min_bits_per_item(fpr, Self::fpr_at)?;
        let bits = (items as f64 * per_item).ceil();
        if bits >= usize::MAX as f64 {
            return Err(BloomError::capacity_overflow(format!(
                "{bits:.0} bits for {items} items at false positive rate {fpr}"
            )));
        }
        let bits = bits as usize;
        tracing::debug!(items, fpr, bits, "planned filter capacity");
        Ok(bits)
    }
}

impl<const K: usize, S: Subfilter, const B: usize, A: FilterAllocator> PartialEq
    for FilterCore<K, S, B, A>
{
    fn eq(&self, other: &Self) -> bool {
        self.range() == other.range() && self.as_bytes() == other.as_bytes()
    }
}

impl<const K: usize, S: Subfilter, const B: usize, A: FilterAllocator> Eq
    for FilterCore<K, S, B, A>
{
}

impl<const K: usize, S: Subfilter, const B: usize, A: FilterAllocator> fmt::Debug
    for FilterCore<K, S, B, A>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCore")
            .field("k", &K)
            .field("bucket_size", &Self::BUCKET_SIZE)
            .field("range", &self.range())
            .field("capacity", &self.capacity())
            .finish()
    }
}
