//! Value-level Bloom filter.
//!
//! [`Filter`] binds a value type and a hash builder to a [`FilterCore`]. Values are hashed
//! to one 64-bit digest (mixed when the hash builder does not avalanche, see
//! [`crate::hash`]) and the digest drives the probe loop.
//!
//! # Type Parameters
//!
//! | Parameter | Meaning                                              | Default          |
//! |-----------|------------------------------------------------------|------------------|
//! | `T`       | Value type, may be unsized (`str`, `[u8]`)           |                  |
//! | `K`       | Buckets probed per value                             |                  |
//! | `S`       | [`Subfilter`] applied to each probed bucket          | `Block<u8, 1>`   |
//! | `B`       | Bucket size in bytes, `0` for the subfilter's size   | `0`              |
//! | `H`       | Hash builder                                         | [`XxHashBuilder`](crate::hash::XxHashBuilder) |
//! | `A`       | Allocator                                            | [`Global`]       |
//!
//! # Examples
//!
//! ```
//! use bloomforge::Filter;
//!
//! let mut filter = Filter::<str, 5>::with_false_positive_rate(1000, 0.01).unwrap();
//! filter.insert("hello");
//! filter.insert("world");
//!
//! assert!(filter.may_contain("hello"));
//! assert!(filter.capacity() >= 9000);
//! ```
//!
//! ## Cache-friendly layouts
//!
//! ```
//! use bloomforge::subfilter::{FastMultiblock32, Multiblock};
//! use bloomforge::Filter;
//!
//! // One bucket per value, eight bits spread over eight 32-bit lanes.
//! let mut fast = Filter::<u64, 1, FastMultiblock32<8>>::new(1 << 20).unwrap();
//! fast.insert(&42);
//! assert!(fast.may_contain(&42));
//!
//! // Buckets one byte apart, so blocks overlap.
//! let mut overlapping = Filter::<u64, 1, Multiblock<u64, 8>, 1>::new(1 << 20).unwrap();
//! overlapping.insert(&42);
//! assert!(overlapping.may_contain(&42));
//! ```

use crate::alloc::{FilterAllocator, Global};
use crate::core::FilterCore;
use crate::error::{BloomError, Result};
use crate::hash::{digest, DefaultHashBuilder, HashQuality};
use crate::subfilter::{Block, Subfilter};
use std::alloc::{handle_alloc_error, Layout};
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// How to size a filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// An explicit number of bits, rounded up to whole buckets.
    Bits(usize),
    /// The smallest array keeping the false positive rate at `fpr` after `items`
    /// insertions.
    Target {
        /// Expected number of distinct values.
        items: usize,
        /// Target false positive rate.
        fpr: f64,
    },
}

impl From<usize> for Sizing {
    fn from(bits: usize) -> Self {
        Self::Bits(bits)
    }
}

/// Probabilistic set membership over values of type `T`.
///
/// No false negatives: a value that was inserted is always reported as possibly present.
/// A value that was not inserted is reported absent except with a small probability
/// controlled by the capacity.
pub struct Filter<
    T: ?Sized,
    const K: usize,
    S: Subfilter = Block<u8, 1>,
    const B: usize = 0,
    H: HashQuality = DefaultHashBuilder,
    A: FilterAllocator = Global,
> {
    core: FilterCore<K, S, B, A>,
    hasher: H,
    _marker: PhantomData<fn(&T)>,
}

impl<T, const K: usize, S, const B: usize, H, A> Filter<T, K, S, B, H, A>
where
    T: ?Sized,
    S: Subfilter,
    H: HashQuality + Default,
    A: FilterAllocator + Default,
{
    /// Create an empty filter with room for at least `bits` bits.
    ///
    /// `bits == 0` creates a zero-capacity filter that reports every value as present.
    ///
    /// # Errors
    ///
    /// Fails if the array cannot be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::Filter;
    ///
    /// let filter = Filter::<u32, 3>::new(1000).unwrap();
    /// assert!(filter.capacity() >= 1000);
    /// ```
    pub fn new(bits: usize) -> Result<Self> {
        Self::with_hasher_in(bits, H::default(), A::default())
    }

    /// Create a filter sized for `items` values at false positive rate `fpr`.
    ///
    /// `items == 0` or `fpr >= 1` yields a zero-capacity filter.
    ///
    /// # Errors
    ///
    /// - [`BloomError::CapacityOverflow`] if `fpr <= 0` with `items > 0`.
    /// - [`BloomError::InvalidFalsePositiveRate`] if `fpr` is NaN.
    /// - [`BloomError::AllocationFailed`] if the array cannot be allocated.
    pub fn with_false_positive_rate(items: usize, fpr: f64) -> Result<Self> {
        Self::with_sizing_in(Sizing::Target { items, fpr }, H::default(), A::default())
    }

    /// Create a filter holding `values`.
    ///
    /// # Errors
    ///
    /// Fails if the sizing is invalid or the array cannot be allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::{Filter, Sizing};
    ///
    /// let words = ["alpha", "beta", "gamma"];
    /// let filter = Filter::<str, 4>::from_values(
    ///     words,
    ///     Sizing::Target { items: 3, fpr: 0.001 },
    /// )
    /// .unwrap();
    /// assert!(words.iter().all(|w| filter.may_contain(w)));
    /// ```
    pub fn from_values<I>(values: I, sizing: impl Into<Sizing>) -> Result<Self>
    where
        T: Hash,
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        Self::from_values_in(values, sizing, H::default(), A::default())
    }
}

impl<T, const K: usize, S, const B: usize, H, A> Filter<T, K, S, B, H, A>
where
    T: ?Sized,
    S: Subfilter,
    H: HashQuality,
    A: FilterAllocator,
{
    /// Probes per value.
    pub const K: usize = K;

    /// Bytes between consecutive buckets.
    pub const BUCKET_SIZE: usize = FilterCore::<K, S, B, A>::BUCKET_SIZE;

    /// Create an empty filter with room for at least `bits` bits, hashing with `hasher`.
    ///
    /// # Errors
    ///
    /// Fails if the array cannot be allocated.
    pub fn with_hasher(bits: usize, hasher: H) -> Result<Self>
    where
        A: Default,
    {
        Self::with_hasher_in(bits, hasher, A::default())
    }

    /// Create an empty filter with room for at least `bits` bits in `alloc`.
    ///
    /// # Errors
    ///
    /// Fails if the array cannot be allocated.
    pub fn new_in(bits: usize, alloc: A) -> Result<Self>
    where
        H: Default,
    {
        Self::with_hasher_in(bits, H::default(), alloc)
    }

    /// Create an empty filter with room for at least `bits` bits.
    ///
    /// # Errors
    ///
    /// Fails if the array cannot be allocated.
    pub fn with_hasher_in(bits: usize, hasher: H, alloc: A) -> Result<Self> {
        Ok(Self {
            core: FilterCore::new_in(bits, alloc)?,
            hasher,
            _marker: PhantomData,
        })
    }

    /// Create a filter sized for `items` values at false positive rate `fpr`.
    ///
    /// # Errors
    ///
    /// See [`with_false_positive_rate`](Self::with_false_positive_rate).
    pub fn with_false_positive_rate_in(items: usize, fpr: f64, hasher: H, alloc: A) -> Result<Self> {
        Self::with_sizing_in(Sizing::Target { items, fpr }, hasher, alloc)
    }

    /// Create an empty filter from any [`Sizing`].
    ///
    /// # Errors
    ///
    /// Fails if the sizing is invalid or the array cannot be allocated.
    pub fn with_sizing_in(sizing: impl Into<Sizing>, hasher: H, alloc: A) -> Result<Self> {
        let bits = Self::bits_for(sizing.into())?;
        Self::with_hasher_in(bits, hasher, alloc)
    }

    /// Create a zero-capacity filter without allocating.
    #[must_use]
    pub fn empty_in(hasher: H, alloc: A) -> Self {
        Self {
            core: FilterCore::empty_in(alloc),
            hasher,
            _marker: PhantomData,
        }
    }

    /// Create a filter holding `values`.
    ///
    /// # Errors
    ///
    /// Fails if the sizing is invalid or the array cannot be allocated.
    pub fn from_values_in<I>(values: I, sizing: impl Into<Sizing>, hasher: H, alloc: A) -> Result<Self>
    where
        T: Hash,
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        let mut filter = Self::with_sizing_in(sizing, hasher, alloc)?;
        filter.insert_all(values);
        Ok(filter)
    }

    fn bits_for(sizing: Sizing) -> Result<usize> {
        match sizing {
            Sizing::Bits(bits) => Ok(bits),
            Sizing::Target { items, fpr } => Self::capacity_for(items, fpr),
        }
    }

    /// Smallest capacity in bits keeping the false positive rate at or below `fpr` after
    /// `items` insertions, for this filter's configuration.
    ///
    /// # Errors
    ///
    /// See [`with_false_positive_rate`](Self::with_false_positive_rate).
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::Filter;
    ///
    /// type F = Filter<u64, 5>;
    /// let bits = F::capacity_for(10_000, 0.01).unwrap();
    /// assert!(F::fpr_for(10_000, bits) <= 0.01);
    /// ```
    pub fn capacity_for(items: usize, fpr: f64) -> Result<usize> {
        FilterCore::<K, S, B, A>::capacity_for(items, fpr)
    }

    /// Expected false positive rate after `items` insertions into `bits` bits.
    #[must_use]
    pub fn fpr_for(items: usize, bits: usize) -> f64 {
        FilterCore::<K, S, B, A>::fpr_for(items, bits)
    }

    /// Record `value`.
    ///
    /// Has no effect on a zero-capacity filter.
    #[inline]
    pub fn insert<Q>(&mut self, value: &Q)
    where
        T: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        let hash = digest(&self.hasher, value);
        self.core.insert(hash);
    }

    /// Record every value produced by `values`.
    pub fn insert_all<I>(&mut self, values: I)
    where
        T: Hash,
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        for value in values {
            self.insert::<T>(value.borrow());
        }
    }

    /// Whether `value` may have been inserted.
    ///
    /// Always true for a zero-capacity filter.
    #[inline]
    #[must_use]
    pub fn may_contain<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        self.core.may_contain(digest(&self.hasher, value))
    }

    /// Clear the filter, then insert `values`.
    pub fn assign_values<I>(&mut self, values: I)
    where
        T: Hash,
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        self.clear();
        self.insert_all(values);
    }

    /// Number of bits in the array. Zero for a zero-capacity filter.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Remove every value, keeping the capacity.
    pub fn clear(&mut self) {
        self.core.clear();
    }

    /// Resize to at least `bits` bits and remove every value.
    ///
    /// # Errors
    ///
    /// Fails if the array cannot be allocated; the filter is then unchanged.
    pub fn reset(&mut self, bits: usize) -> Result<()> {
        self.core.reset(bits)
    }

    /// Resize for `items` values at false positive rate `fpr` and remove every value.
    ///
    /// # Errors
    ///
    /// Fails if the sizing is invalid or the array cannot be allocated; the filter is
    /// then unchanged.
    pub fn reset_for(&mut self, items: usize, fpr: f64) -> Result<()> {
        let bits = Self::capacity_for(items, fpr)?;
        self.core.reset(bits)
    }

    /// The allocator backing the array.
    #[must_use]
    pub fn allocator(&self) -> &A {
        self.core.allocator()
    }

    /// The hash builder.
    #[must_use]
    pub fn hash_function(&self) -> &H {
        &self.hasher
    }

    /// The raw bucket array.
    ///
    /// Empty for a zero-capacity filter.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.core.as_bytes()
    }

    /// Copy this filter into a new array from `alloc`.
    ///
    /// # Errors
    ///
    /// Fails if the array cannot be allocated.
    pub fn clone_in(&self, alloc: A) -> Result<Self>
    where
        H: Clone,
    {
        Ok(Self {
            core: self.core.try_clone_in(alloc)?,
            hasher: self.hasher.clone(),
            _marker: PhantomData,
        })
    }

    /// Fallible [`Clone::clone`].
    ///
    /// # Errors
    ///
    /// Fails if the array cannot be allocated.
    pub fn try_clone(&self) -> Result<Self>
    where
        H: Clone,
    {
        self.clone_in(self.allocator().select_on_copy())
    }

    /// Move the contents out, leaving `self` with zero capacity.
    #[must_use]
    pub fn take(&mut self) -> Self
    where
        H: Clone,
    {
        Self {
            core: self.core.take(),
            hasher: self.hasher.clone(),
            _marker: PhantomData,
        }
    }

    /// Move the contents into a filter backed by `alloc`, leaving `self` with zero
    /// capacity.
    ///
    /// The array is transferred when `alloc` is interchangeable with the current
    /// allocator, and copied otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the array must be copied and cannot be allocated; `self` is then
    /// unchanged.
    pub fn take_in(&mut self, alloc: A) -> Result<Self>
    where
        H: Clone,
    {
        Ok(Self {
            core: self.core.take_in(alloc)?,
            hasher: self.hasher.clone(),
            _marker: PhantomData,
        })
    }

    /// Make `self` a copy of `source`, including its hash builder.
    ///
    /// The allocator follows [`Propagation::on_copy_assignment`](crate::alloc::Propagation).
    ///
    /// # Errors
    ///
    /// Fails if a new array cannot be allocated; `self` is then unchanged.
    pub fn assign_from(&mut self, source: &Self) -> Result<()>
    where
        H: Clone,
    {
        self.core.assign_from(&source.core)?;
        self.hasher = source.hasher.clone();
        Ok(())
    }

    /// Move the contents of `source` into `self`, leaving `source` with zero capacity.
    ///
    /// Hash builders are exchanged. The allocator follows
    /// [`Propagation::on_move_assignment`](crate::alloc::Propagation).
    ///
    /// # Errors
    ///
    /// Fails if the allocators are not interchangeable and the copy cannot be
    /// allocated; both filters are then unchanged.
    pub fn assign_take(&mut self, source: &mut Self) -> Result<()> {
        self.core.assign_take(&mut source.core)?;
        std::mem::swap(&mut self.hasher, &mut source.hasher);
        Ok(())
    }

    /// Exchange contents and hash builders with `other`.
    ///
    /// # Panics
    ///
    /// Panics if the allocators do not propagate on swap and are not interchangeable.
    /// Neither filter is modified in that case.
    pub fn swap(&mut self, other: &mut Self) {
        self.core.swap(&mut other.core);
        std::mem::swap(&mut self.hasher, &mut other.hasher);
    }

    /// Add every value of `other` to `self` (bitwise OR).
    ///
    /// # Errors
    ///
    /// [`BloomError::IncompatibleFilters`] if the capacities or allocators differ; `self`
    /// is then unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomforge::Filter;
    ///
    /// let mut a = Filter::<str, 4>::new(8192).unwrap();
    /// let mut b = Filter::<str, 4>::new(8192).unwrap();
    /// a.insert("left");
    /// b.insert("right");
    /// a.union(&b).unwrap();
    /// assert!(a.may_contain("left") && a.may_contain("right"));
    /// ```
    pub fn union(&mut self, other: &Self) -> Result<()> {
        self.core.union(&other.core)
    }

    /// Keep only the bits also set in `other` (bitwise AND).
    ///
    /// Values inserted in both filters remain present.
    ///
    /// # Errors
    ///
    /// [`BloomError::IncompatibleFilters`] if the capacities or allocators differ; `self`
    /// is then unchanged.
    pub fn intersect(&mut self, other: &Self) -> Result<()> {
        self.core.intersect(&other.core)
    }
}

#[cold]
#[inline(never)]
fn clone_failed(err: &BloomError) -> ! {
    tracing::error!(%err, "filter clone failed");
    let bytes = match *err {
        BloomError::AllocationFailed { bytes } => bytes.max(1),
        _ => 1,
    };
    handle_alloc_error(Layout::from_size_align(bytes, 1).unwrap_or(Layout::new::<u8>()))
}

impl<T, const K: usize, S, const B: usize, H, A> Clone for Filter<T, K, S, B, H, A>
where
    T: ?Sized,
    S: Subfilter,
    H: HashQuality + Clone,
    A: FilterAllocator,
{
    /// Aborts through [`handle_alloc_error`] if the copy cannot be allocated; use
    /// [`try_clone`](Filter::try_clone) to handle that case.
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|err| clone_failed(&err))
    }

    fn clone_from(&mut self, source: &Self) {
        if let Err(err) = self.assign_from(source) {
            clone_failed(&err);
        }
    }
}

impl<T, const K: usize, S, const B: usize, H, A> Default for Filter<T, K, S, B, H, A>
where
    T: ?Sized,
    S: Subfilter,
    H: HashQuality + Default,
    A: FilterAllocator + Default,
{
    /// A zero-capacity filter.
    fn default() -> Self {
        Self::empty_in(H::default(), A::default())
    }
}

impl<T, const K: usize, S, const B: usize, H, A, V> Extend<V> for Filter<T, K, S, B, H, A>
where
    T: Hash + ?Sized,
    S: Subfilter,
    H: HashQuality,
    A: FilterAllocator,
    V: Borrow<T>,
{
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        self.insert_all(iter);
    }
}

/// Filters are equal when their bucket arrays are bit-identical. Hash builders are not
/// compared.
impl<T, const K: usize, S, const B: usize, H, A> PartialEq for Filter<T, K, S, B, H, A>
where
    T: ?Sized,
    S: Subfilter,
    H: HashQuality,
    A: FilterAllocator,
{
    fn eq(&self, other: &Self) -> bool {
        self.core == other.core
    }
}

impl<T, const K: usize, S, const B: usize, H, A> Eq for Filter<T, K, S, B, H, A>
where
    T: ?Sized,
    S: Subfilter,
    H: HashQuality,
    A: FilterAllocator,
{
}

impl<T, const K: usize, S, const B: usize, H, A> fmt::Debug for Filter<T, K, S, B, H, A>
where
    T: ?Sized,
    S: Subfilter,
    H: HashQuality,
    A: FilterAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("k", &K)
            .field("subfilter", &std::any::type_name::<S>())
            .field("bucket_size", &Self::BUCKET_SIZE)
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
