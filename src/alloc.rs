//! Allocator binding for filter storage.
//!
//! A filter owns exactly one byte buffer, obtained from a [`FilterAllocator`]. Besides
//! allocating and freeing raw bytes, an allocator declares how its identity travels when
//! the owning filter is copied, moved or swapped. Those rules live in a small capability
//! struct, [`Propagation`], attached to every allocator type as an associated constant;
//! the storage layer consults it and never hardcodes allocator behavior.
//!
//! | Flag                  | Consulted by                                  |
//! |-----------------------|-----------------------------------------------|
//! | `on_copy_assignment`  | [`Filter::assign_from`](crate::Filter::assign_from), `clone_from` |
//! | `on_move_assignment`  | [`Filter::assign_take`](crate::Filter::assign_take) |
//! | `on_swap`             | [`Filter::swap`](crate::Filter::swap)         |
//! | `always_equal`        | every operation deciding whether a buffer may be shared |
//!
//! # Examples
//!
//! ```
//! use bloomforge::alloc::{FilterAllocator, Global, Propagation};
//!
//! assert!(Global::PROPAGATION.always_equal);
//! assert!(Global::PROPAGATION.on_move_assignment);
//! assert!(!Global::PROPAGATION.on_swap);
//! ```

use crate::error::{BloomError, Result};
use std::alloc::Layout;
use std::ptr::NonNull;

/// Propagation behavior of an allocator across filter copy, move and swap.
///
/// Every flag is load-bearing: it decides both which allocator the destination ends up
/// with and whether the underlying buffer can be transferred instead of copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Propagation {
    /// Copy-assignment replaces the destination allocator with the source's.
    pub on_copy_assignment: bool,
    /// Move-assignment replaces the destination allocator with the source's.
    pub on_move_assignment: bool,
    /// Swapping two filters swaps their allocators too.
    pub on_swap: bool,
    /// Any two instances compare equal and may free each other's buffers.
    pub always_equal: bool,
}

impl Propagation {
    /// Nothing propagates and instances are only equal if they say so.
    pub const NONE: Self = Self {
        on_copy_assignment: false,
        on_move_assignment: false,
        on_swap: false,
        always_equal: false,
    };

    /// Everything propagates.
    pub const ALL: Self = Self {
        on_copy_assignment: true,
        on_move_assignment: true,
        on_swap: true,
        always_equal: false,
    };

    /// Same propagation on copy, move and swap, with an explicit always-equal flag.
    #[must_use]
    pub const fn uniform(propagate: bool, always_equal: bool) -> Self {
        Self {
            on_copy_assignment: propagate,
            on_move_assignment: propagate,
            on_swap: propagate,
            always_equal,
        }
    }
}

/// Source of raw bytes for filter arrays.
///
/// Equality between two allocators means a buffer obtained from one may be released
/// through the other, so two filters holding equal allocators can hand buffers over
/// without copying.
///
/// # Safety contract for implementors
///
/// `allocate` must return a pointer valid for reads and writes of `layout.size()` bytes,
/// and `deallocate` must accept any pointer returned by an equal allocator with the same
/// layout. The returned memory does not need to be initialized.
pub trait FilterAllocator: Clone + PartialEq {
    /// Propagation rules for this allocator type.
    const PROPAGATION: Propagation = Propagation::NONE;

    /// Allocate `layout.size()` bytes aligned to `layout.align()`.
    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>>;

    /// Release a buffer previously returned by `allocate`.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator (or one comparing
    /// equal to it) with the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout);

    /// Allocator used by a filter created as a copy of a filter holding `self`.
    #[must_use]
    fn select_on_copy(&self) -> Self {
        self.clone()
    }

    /// Whether buffers may move between filters holding `self` and `other`.
    #[inline]
    fn is_interchangeable_with(&self, other: &Self) -> bool {
        Self::PROPAGATION.always_equal || self == other
    }
}

/// The process heap, via [`std::alloc`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Global;

impl FilterAllocator for Global {
    const PROPAGATION: Propagation = Propagation {
        on_copy_assignment: false,
        on_move_assignment: true,
        on_swap: false,
        always_equal: true,
    };

    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>> {
        if layout.size() == 0 {
            return Err(BloomError::allocation_failed(0));
        }
        // SAFETY: layout has a nonzero size.
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or_else(|| BloomError::allocation_failed(layout.size()))
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from the caller.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}
