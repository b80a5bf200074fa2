//! Bucket array storage.
//!
//! [`FilterStorage`] owns the byte buffer behind a filter together with the allocator it
//! came from and the [`McgFastRange`] that addresses it. The buffer is laid out as
//!
//! ```text
//! data                buckets
//! │                   │
//! ▼                   ▼
//! ┌───────────────────┬──────────┬──────────┬─────┬──────────┬──────┐
//! │ alignment padding │ bucket 0 │ bucket 1 │ ... │ bucket r │ tail │
//! └───────────────────┴──────────┴──────────┴─────┴──────────┴──────┘
//!   < ALIGNMENT bytes   BUCKET_SIZE bytes each                TAIL_SIZE
//! ```
//!
//! so that `(ALIGNMENT - 1) + range × BUCKET_SIZE + TAIL_SIZE` bytes are requested from
//! the allocator with byte alignment, and `buckets` is rounded up inside the allocation.
//! The tail absorbs the bytes a full-width block access spills past the last bucket.
//!
//! # Degenerate state
//!
//! A storage with zero range owns no buffer. Its `buckets` pointer refers to a static
//! all-ones array instead, so reads succeed and report every bit as set. That array is
//! never written to: callers check [`FilterStorage::is_allocated`] before marking.
//!
//! # Failure atomicity
//!
//! Every operation that replaces the buffer allocates the new one before releasing the
//! old one. An allocation failure therefore leaves the storage untouched.

use super::hash_strategy::McgFastRange;
use crate::alloc::FilterAllocator;
use crate::error::{BloomError, Result};
use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

/// Size of the shared all-ones array backing degenerate filters.
pub const SENTINEL_SIZE: usize = 4096;

/// Largest bucket alignment the storage supports.
pub const MAX_ALIGNMENT: usize = 64;

#[repr(C, align(64))]
struct Sentinel([u8; SENTINEL_SIZE]);

static SENTINEL: Sentinel = Sentinel([0xFF; SENTINEL_SIZE]);

#[inline]
fn sentinel_buckets() -> NonNull<u8> {
    NonNull::from(&SENTINEL).cast::<u8>()
}

/// Byte geometry of a bucket array.
pub trait ArrayShape {
    /// Stride between consecutive buckets, in bytes.
    const BUCKET_SIZE: usize;
    /// Extra bytes past the last bucket that block accesses may touch.
    const TAIL_SIZE: usize;
    /// Alignment of the first bucket. A power of two no larger than [`MAX_ALIGNMENT`].
    const ALIGNMENT: usize;
}

#[derive(Debug, Clone, Copy)]
struct Allocation {
    ptr: NonNull<u8>,
    layout: Layout,
}

/// Owned, aligned bucket array.
pub struct FilterStorage<L: ArrayShape, A: FilterAllocator> {
    alloc: A,
    hs: McgFastRange,
    data: Option<Allocation>,
    buckets: NonNull<u8>,
    _shape: PhantomData<fn() -> L>,
}

// SAFETY: the buffer is exclusively owned and the sentinel is immutable.
unsafe impl<L: ArrayShape, A: FilterAllocator + Send> Send for FilterStorage<L, A> {}
// SAFETY: shared references only read the buffer.
unsafe impl<L: ArrayShape, A: FilterAllocator + Sync> Sync for FilterStorage<L, A> {}

impl<L: ArrayShape, A: FilterAllocator> FilterStorage<L, A> {
    const SHAPE_FITS: () = {
        assert!(L::BUCKET_SIZE > 0, "bucket size must be nonzero");
        assert!(L::ALIGNMENT.is_power_of_two());
        assert!(L::ALIGNMENT <= MAX_ALIGNMENT);
        assert!(
            (L::ALIGNMENT - 1) + 3 * L::BUCKET_SIZE + L::TAIL_SIZE <= SENTINEL_SIZE,
            "bucket layout too large for the degenerate sentinel"
        );
    };

    /// Number of buckets needed to hold `bits` bits.
    #[inline]
    #[must_use]
    pub const fn buckets_needed(bits: usize) -> usize {
        let bytes = bits / 8 + (bits % 8 != 0) as usize;
        bytes / L::BUCKET_SIZE + (bytes % L::BUCKET_SIZE != 0) as usize
    }

    /// Bytes requested from the allocator for `rng` buckets.
    pub fn space_for(rng: usize) -> Result<usize> {
        rng.checked_mul(L::BUCKET_SIZE)
            .and_then(|b| b.checked_add(L::ALIGNMENT - 1 + L::TAIL_SIZE))
            .ok_or_else(|| {
                BloomError::capacity_overflow(format!(
                    "{rng} buckets of {} bytes",
                    L::BUCKET_SIZE
                ))
            })
    }

    fn layout_for(rng: usize) -> Result<Layout> {
        let size = Self::space_for(rng)?;
        Layout::from_size_align(size, 1).map_err(|_| {
            BloomError::capacity_overflow(format!("{size} bytes exceeds the address space"))
        })
    }

    #[inline]
    fn buckets_for(ptr: NonNull<u8>) -> NonNull<u8> {
        let offset = (ptr.as_ptr() as usize).wrapping_neg() & (L::ALIGNMENT - 1);
        // SAFETY: offset < ALIGNMENT, and every allocation reserves ALIGNMENT - 1
        // padding bytes ahead of the bucket region.
        unsafe { NonNull::new_unchecked(ptr.as_ptr().add(offset)) }
    }

    fn new_array(alloc: &mut A, rng: usize) -> Result<(Option<Allocation>, NonNull<u8>)> {
        if rng == 0 {
            return Ok((None, sentinel_buckets()));
        }
        let layout = Self::layout_for(rng)?;
        let ptr = alloc.allocate(layout)?;
        tracing::trace!(range = rng, bytes = layout.size(), "allocated bucket array");
        Ok((Some(Allocation { ptr, layout }), Self::buckets_for(ptr)))
    }

    fn delete_array(&mut self) {
        if let Some(a) = self.data.take() {
            // SAFETY: `a` was produced by `new_array` with an allocator equal to `self.alloc`.
            unsafe { self.alloc.deallocate(a.ptr, a.layout) };
            tracing::trace!(bytes = a.layout.size(), "released bucket array");
        }
    }

    fn install(&mut self, hs: McgFastRange, array: (Option<Allocation>, NonNull<u8>)) {
        self.delete_array();
        self.hs = hs;
        self.data = array.0;
        self.buckets = array.1;
    }

    fn become_empty(&mut self) {
        debug_assert!(self.data.is_none());
        self.hs = McgFastRange::new(0);
        self.buckets = sentinel_buckets();
    }

    fn clear_bytes(&mut self) {
        if let Some(a) = self.data {
            // SAFETY: the allocation spans `layout.size()` writable bytes.
            unsafe { ptr::write_bytes(a.ptr.as_ptr(), 0, a.layout.size()) };
        }
    }

    fn copy_bytes(&mut self, source: &Self) {
        debug_assert_eq!(self.range(), source.range());
        if self.data.is_some() {
            // SAFETY: both arrays have the same range, so both bucket regions span
            // `region_len` initialized bytes, and distinct allocations never overlap.
            unsafe {
                ptr::copy_nonoverlapping(
                    source.buckets.as_ptr(),
                    self.buckets.as_ptr(),
                    self.region_len(),
                );
            }
        }
    }

    #[inline]
    fn region_len(&self) -> usize {
        match self.data {
            Some(_) => self.hs.range() * L::BUCKET_SIZE + L::TAIL_SIZE,
            None => 0,
        }
    }

    /// Allocate a zeroed array for `bits` bits.
    ///
    /// `bits == 0` allocates nothing and yields the degenerate state.
    ///
    /// # Errors
    ///
    /// [`BloomError::CapacityOverflow`] if the size is not representable, or
    /// [`BloomError::AllocationFailed`] if the allocator refuses.
    pub fn new_in(bits: usize, mut alloc: A) -> Result<Self> {
        let () = Self::SHAPE_FITS;
        let hs = McgFastRange::new(Self::buckets_needed(bits));
        let rng = if bits == 0 { 0 } else { hs.range() };
        let (data, buckets) = Self::new_array(&mut alloc, rng)?;
        let mut storage = Self {
            alloc,
            hs,
            data,
            buckets,
            _shape: PhantomData,
        };
        storage.clear_bytes();
        tracing::debug!(
            requested_bits = bits,
            range = storage.range(),
            capacity = storage.capacity(),
            "created filter storage"
        );
        Ok(storage)
    }

    /// A storage in the degenerate state, without allocating.
    #[must_use]
    pub fn empty_in(alloc: A) -> Self {
        let () = Self::SHAPE_FITS;
        Self {
            alloc,
            hs: McgFastRange::new(0),
            data: None,
            buckets: sentinel_buckets(),
            _shape: PhantomData,
        }
    }

    /// Deep copy into a fresh buffer obtained from `alloc`.
    ///
    /// # Errors
    ///
    /// Fails if the allocation fails.
    pub fn try_clone_in(&self, mut alloc: A) -> Result<Self> {
        let (data, buckets) = Self::new_array(&mut alloc, self.range())?;
        let mut storage = Self {
            alloc,
            hs: self.hs,
            data,
            buckets,
            _shape: PhantomData,
        };
        storage.copy_bytes(self);
        Ok(storage)
    }

    /// Move the buffer out, leaving `self` degenerate.
    #[must_use]
    pub fn take(&mut self) -> Self {
        let taken = Self {
            alloc: self.alloc.clone(),
            hs: self.hs,
            data: self.data.take(),
            buckets: self.buckets,
            _shape: PhantomData,
        };
        self.become_empty();
        taken
    }

    /// Move into a storage bound to `alloc`, leaving `self` degenerate.
    ///
    /// The buffer is transferred when `alloc` can release it; otherwise its contents are
    /// copied into a buffer from `alloc` and the original is freed.
    ///
    /// # Errors
    ///
    /// Fails if the copy cannot be allocated, in which case `self` is unchanged.
    pub fn take_in(&mut self, alloc: A) -> Result<Self> {
        if alloc.is_interchangeable_with(&self.alloc) {
            let mut taken = self.take();
            taken.alloc = alloc;
            return Ok(taken);
        }
        let copy = self.try_clone_in(alloc)?;
        tracing::debug!(range = copy.range(), "allocators differ, moved by copying");
        self.delete_array();
        self.become_empty();
        Ok(copy)
    }

    /// Copy-assign from `source`.
    ///
    /// The allocator is inherited when it propagates on copy assignment. The current
    /// buffer is reused when the allocator stays the same and the ranges already match.
    ///
    /// # Errors
    ///
    /// Fails if a new buffer is needed and cannot be allocated; `self` is then unchanged.
    pub fn assign_from(&mut self, source: &Self) -> Result<()> {
        if A::PROPAGATION.on_copy_assignment {
            if self.alloc != source.alloc || self.range() != source.range() {
                let mut source_alloc = source.alloc.clone();
                let array = Self::new_array(&mut source_alloc, source.range())?;
                self.install(source.hs, array);
            }
            self.alloc = source.alloc.clone();
        } else if self.range() != source.range() {
            let array = Self::new_array(&mut self.alloc, source.range())?;
            self.install(source.hs, array);
        }
        self.copy_bytes(source);
        Ok(())
    }

    /// Move-assign from `source`, leaving it degenerate.
    ///
    /// The buffer is stolen when the allocator propagates on move assignment or both
    /// allocators compare equal. Otherwise the contents are copied into a buffer owned by
    /// `self`'s allocator and `source`'s buffer is freed.
    ///
    /// # Errors
    ///
    /// Fails only on the copying path; both storages are then unchanged.
    pub fn assign_take(&mut self, source: &mut Self) -> Result<()> {
        if A::PROPAGATION.on_move_assignment || self.alloc == source.alloc {
            self.delete_array();
            if A::PROPAGATION.on_move_assignment {
                self.alloc = source.alloc.clone();
            }
            self.hs = source.hs;
            self.data = source.data.take();
            self.buckets = source.buckets;
        } else {
            if self.range() != source.range() {
                let array = Self::new_array(&mut self.alloc, source.range())?;
                self.install(source.hs, array);
            }
            self.copy_bytes(source);
            source.delete_array();
            tracing::debug!(range = self.range(), "allocators differ, move-assigned by copying");
        }
        source.become_empty();
        Ok(())
    }

    /// Exchange contents with `other`.
    ///
    /// Allocators are exchanged only if they propagate on swap; otherwise they must
    /// already be interchangeable.
    ///
    /// # Panics
    ///
    /// Panics, before touching either storage, if the allocators neither propagate on
    /// swap nor are interchangeable. Each buffer would otherwise be released through an
    /// allocator that did not produce it.
    pub fn swap(&mut self, other: &mut Self) {
        if A::PROPAGATION.on_swap {
            std::mem::swap(&mut self.alloc, &mut other.alloc);
        } else {
            assert!(
                self.alloc.is_interchangeable_with(&other.alloc),
                "swapping filters with unequal non-propagating allocators"
            );
        }
        std::mem::swap(&mut self.hs, &mut other.hs);
        std::mem::swap(&mut self.data, &mut other.data);
        std::mem::swap(&mut self.buckets, &mut other.buckets);
    }

    /// Zero every byte of the buffer.
    pub fn clear(&mut self) {
        self.clear_bytes();
    }

    /// Resize for `bits` bits and zero the result.
    ///
    /// The buffer is only reallocated when the bucket range changes.
    ///
    /// # Errors
    ///
    /// Fails if a new buffer cannot be allocated; `self` is then unchanged.
    pub fn reset(&mut self, bits: usize) -> Result<()> {
        let hs = McgFastRange::new(Self::buckets_needed(bits));
        let rng = if bits == 0 { 0 } else { hs.range() };
        if rng != self.range() {
            let array = Self::new_array(&mut self.alloc, rng)?;
            tracing::debug!(from = self.range(), to = rng, "reallocating on reset");
            self.install(hs, array);
        }
        self.clear_bytes();
        Ok(())
    }

    /// Number of buckets, or 0 when no buffer is held.
    #[inline]
    #[must_use]
    pub fn range(&self) -> usize {
        if self.data.is_some() {
            self.hs.range()
        } else {
            0
        }
    }

    /// Number of bits held by the bucket array.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        (self.range() * L::BUCKET_SIZE).saturating_mul(8)
    }

    /// Whether a buffer is held. When false, the buckets are the read-only sentinel.
    #[inline(always)]
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    /// The position generator addressing this array.
    #[inline(always)]
    #[must_use]
    pub fn hash_strategy(&self) -> &McgFastRange {
        &self.hs
    }

    /// Pointer to the first bucket.
    ///
    /// Valid for reads of `(ALIGNMENT - 1) + 3 × BUCKET_SIZE + TAIL_SIZE` bytes in the
    /// degenerate state and of the whole bucket region otherwise. Writable only when
    /// [`is_allocated`](Self::is_allocated) holds.
    #[inline(always)]
    #[must_use]
    pub fn buckets(&self) -> NonNull<u8> {
        self.buckets
    }

    /// The allocator owning the buffer.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// The bucket region followed by its tail. Empty when no buffer is held.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the region lies inside the allocation and was zeroed or copied into.
        unsafe { std::slice::from_raw_parts(self.buckets.as_ptr(), self.region_len()) }
    }

    /// Mutable view of [`as_bytes`](Self::as_bytes).
    #[must_use]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.region_len();
        // SAFETY: as above, and `len` is 0 for the sentinel so it is never written.
        unsafe { std::slice::from_raw_parts_mut(self.buckets.as_ptr(), len) }
    }
}

impl<L: ArrayShape, A: FilterAllocator> Drop for FilterStorage<L, A> {
    fn drop(&mut self) {
        self.delete_array();
    }
}

impl<L: ArrayShape, A: FilterAllocator> fmt::Debug for FilterStorage<L, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStorage")
            .field("range", &self.range())
            .field("bucket_size", &L::BUCKET_SIZE)
            .field("capacity", &self.capacity())
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Global;

    struct Aligned8;
    impl ArrayShape for Aligned8 {
        const BUCKET_SIZE: usize = 8;
        const TAIL_SIZE: usize = 0;
        const ALIGNMENT: usize = 64;
    }

    struct Packed3;
    impl ArrayShape for Packed3 {
        const BUCKET_SIZE: usize = 3;
        const TAIL_SIZE: usize = 5;
        const ALIGNMENT: usize = 1;
    }

    type Aligned = FilterStorage<Aligned8, Global>;
    type Packed = FilterStorage<Packed3, Global>;

    #[test]
    fn test_buckets_needed() {
        assert_eq!(Aligned::buckets_needed(0), 0);
        assert_eq!(Aligned::buckets_needed(1), 1);
        assert_eq!(Aligned::buckets_needed(64), 1);
        assert_eq!(Aligned::buckets_needed(65), 2);
        assert_eq!(Packed::buckets_needed(24), 1);
        assert_eq!(Packed::buckets_needed(25), 2);
        assert_eq!(Packed::buckets_needed(usize::MAX), usize::MAX / 8 / 3 + 1);
    }

    #[test]
    fn test_space_for() {
        assert_eq!(Aligned::space_for(3).unwrap(), 63 + 24);
        assert_eq!(Packed::space_for(11).unwrap(), 33 + 5);
        assert!(Aligned::space_for(usize::MAX).unwrap_err().is_allocation_failure());
    }

    #[test]
    fn test_new_is_zeroed_and_aligned() {
        let s = Aligned::new_in(1000, Global).unwrap();
        assert!(s.is_allocated());
        assert!(s.capacity() >= 1000);
        assert_eq!(s.capacity(), s.range() * 64);
        assert_eq!(s.buckets().as_ptr() as usize % 64, 0);
        assert!(s.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(s.as_bytes().len(), s.range() * 8);
    }

    #[test]
    fn test_packed_region_includes_tail() {
        let s = Packed::new_in(100, Global).unwrap();
        assert_eq!(s.as_bytes().len(), s.range() * 3 + 5);
    }

    #[test]
    fn test_zero_bits_is_degenerate() {
        let s = Aligned::new_in(0, Global).unwrap();
        assert!(!s.is_allocated());
        assert_eq!(s.range(), 0);
        assert_eq!(s.capacity(), 0);
        assert!(s.as_bytes().is_empty());
        // SAFETY: the sentinel is readable for three buckets.
        let first = unsafe { *s.buckets().as_ptr() };
        assert_eq!(first, 0xFF);
        assert_eq!(s.hash_strategy().range(), 3);
    }

    #[test]
    fn test_clone_is_deep() {
        let mut a = Packed::new_in(200, Global).unwrap();
        a.as_bytes_mut()[4] = 0x5A;
        let mut b = a.try_clone_in(Global).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        b.as_bytes_mut()[4] = 0;
        assert_eq!(a.as_bytes()[4], 0x5A);
    }

    #[test]
    fn test_take_leaves_source_degenerate() {
        let mut a = Aligned::new_in(512, Global).unwrap();
        a.as_bytes_mut()[0] = 1;
        let ptr = a.buckets();
        let b = a.take();
        assert_eq!(b.buckets(), ptr);
        assert_eq!(b.as_bytes()[0], 1);
        assert_eq!(a.range(), 0);
        assert!(!a.is_allocated());
    }

    #[test]
    fn test_reset_changes_range() {
        let mut s = Aligned::new_in(64, Global).unwrap();
        s.as_bytes_mut()[0] = 9;
        s.reset(64).unwrap();
        assert_eq!(s.as_bytes()[0], 0);
        s.reset(10_000).unwrap();
        assert!(s.capacity() >= 10_000);
        s.reset(0).unwrap();
        assert_eq!(s.capacity(), 0);
        assert!(!s.is_allocated());
    }

    #[test]
    fn test_assign_from_reuses_matching_buffer() {
        let mut src = Aligned::new_in(4096, Global).unwrap();
        src.as_bytes_mut()[7] = 0xEE;
        let mut dst = Aligned::new_in(4096, Global).unwrap();
        let before = dst.buckets();
        dst.assign_from(&src).unwrap();
        assert_eq!(dst.buckets(), before);
        assert_eq!(dst.as_bytes(), src.as_bytes());

        let mut small = Aligned::new_in(8, Global).unwrap();
        small.assign_from(&src).unwrap();
        assert_eq!(small.range(), src.range());
        assert_eq!(small.as_bytes()[7], 0xEE);
    }

    #[test]
    fn test_assign_take_steals_with_global() {
        let mut src = Aligned::new_in(4096, Global).unwrap();
        let ptr = src.buckets();
        let mut dst = Aligned::new_in(64, Global).unwrap();
        dst.assign_take(&mut src).unwrap();
        assert_eq!(dst.buckets(), ptr);
        assert_eq!(src.capacity(), 0);
    }

    #[test]
    fn test_swap() {
        let mut a = Aligned::new_in(64, Global).unwrap();
        let mut b = Aligned::new_in(0, Global).unwrap();
        a.swap(&mut b);
        assert_eq!(a.capacity(), 0);
        assert!(b.capacity() >= 64);
    }

    #[test]
    fn test_clear_on_degenerate_is_noop() {
        let mut s = Packed::empty_in(Global);
        s.clear();
        assert_eq!(s.capacity(), 0);
    }
}
