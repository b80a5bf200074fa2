//! Construction, copy, move and swap with stateful allocators.
//!
//! Every test owns a fresh [`Ledger`], and the tracking allocator panics if a buffer is
//! released through an allocator that could not have made it.

mod common;

use bloomforge::alloc::FilterAllocator;
use bloomforge::subfilter::{Block, FastMultiblock32, Multiblock};
use bloomforge::{Filter, Sizing, XxHashBuilder};
use common::{init_tracing, make_strings, make_u64s, Interchangeable, Ledger, Propagating, Sticky};

type F<A> = Filter<u64, 3, Block<u64, 2>, 0, XxHashBuilder, A>;

fn filled<A: FilterAllocator>(bits: usize, alloc: A, seed: u64) -> F<A> {
    let mut filter = F::with_hasher_in(bits, XxHashBuilder::with_seed(seed), alloc).unwrap();
    filter.insert_all(make_u64s(200, seed));
    filter
}

#[test]
fn test_new_allocates_once_and_drop_frees() {
    init_tracing();
    let ledger = Ledger::new();
    {
        let filter = F::with_hasher_in(10_000, XxHashBuilder::new(), Sticky::new(1, &ledger)).unwrap();
        assert!(filter.capacity() >= 10_000);
        assert_eq!(ledger.allocation_count(), 1);
        assert_eq!(ledger.sole_owner(), Some(1));
        assert!(filter.as_bytes().iter().all(|&b| b == 0));
    }
    assert_eq!(ledger.outstanding_buffers(), 0);
}

#[test]
fn test_zero_bits_never_allocates() {
    let ledger = Ledger::new();
    let mut filter = F::with_hasher_in(0, XxHashBuilder::new(), Sticky::new(1, &ledger)).unwrap();
    filter.insert(&5);
    filter.clear();
    assert_eq!(filter.capacity(), 0);
    assert!(filter.may_contain(&12345));
    let empty = F::empty_in(XxHashBuilder::new(), Sticky::new(1, &ledger));
    assert_eq!(filter, empty);
    assert_eq!(ledger.allocation_count(), 0);
}

#[test]
fn test_values_constructor() {
    let words = make_strings(500, 3);
    let filter = Filter::<String, 4, Multiblock<u32, 3>>::from_values(
        &words,
        Sizing::Target { items: 500, fpr: 0.01 },
    )
    .unwrap();
    assert!(words.iter().all(|w| filter.may_contain(w.as_str())));

    let by_bits = Filter::<String, 4, Multiblock<u32, 3>>::from_values(&words, Sizing::Bits(8192)).unwrap();
    assert!(by_bits.capacity() >= 8192);
    assert!(words.iter().all(|w| by_bits.may_contain(w)));
}

#[test]
fn test_values_constructor_with_allocator() {
    let ledger = Ledger::new();
    let values = make_u64s(100, 9);
    let filter = F::from_values_in(&values, Sizing::Bits(4096), XxHashBuilder::new(), Sticky::new(4, &ledger)).unwrap();
    assert_eq!(filter.allocator().id, 4);
    assert!(values.iter().all(|v| filter.may_contain(v)));
}

#[test]
fn test_false_positive_rate_constructor_with_allocator() {
    let ledger = Ledger::new();
    let filter = F::with_false_positive_rate_in(1000, 0.01, XxHashBuilder::new(), Sticky::new(2, &ledger)).unwrap();
    assert!(F::<Sticky>::fpr_for(1000, filter.capacity()) <= 0.01);
    assert_eq!(filter.allocator().id, 2);
}

#[test]
fn test_try_clone_is_deep_and_uses_same_allocator() {
    let ledger = Ledger::new();
    let original = filled(4096, Sticky::new(7, &ledger), 1);
    let mut copy = original.try_clone().unwrap();
    assert_eq!(copy, original);
    assert_eq!(copy.allocator().id, 7);
    assert_eq!(copy.hash_function().seed(), 1);
    assert_eq!(ledger.outstanding_buffers(), 2);

    copy.insert(&u64::MAX);
    copy.clear();
    assert_ne!(copy, original);
}

#[test]
fn test_clone_trait_matches_try_clone() {
    let original = Filter::<str, 2, FastMultiblock32<8>>::from_values(["a", "b", "c"], Sizing::Bits(2048)).unwrap();
    let copy = original.clone();
    assert_eq!(copy, original);
    assert!(copy.may_contain("b"));
}

#[test]
fn test_clone_in_other_allocator() {
    let ledger = Ledger::new();
    let original = filled(4096, Sticky::new(1, &ledger), 2);
    let copy = original.clone_in(Sticky::new(2, &ledger)).unwrap();
    assert_eq!(copy, original);
    assert_eq!(copy.allocator().id, 2);
}

#[test]
fn test_copy_assignment_keeps_sticky_allocator() {
    let ledger = Ledger::new();
    let source = filled(8192, Sticky::new(2, &ledger), 11);
    let mut target = filled(1024, Sticky::new(1, &ledger), 12);

    target.assign_from(&source).unwrap();
    assert_eq!(target, source);
    assert_eq!(target.allocator().id, 1);
    assert_eq!(target.hash_function().seed(), 11);
    drop(source);
    assert_eq!(ledger.sole_owner(), Some(1));
}

#[test]
fn test_copy_assignment_propagates_allocator() {
    let ledger = Ledger::new();
    let source = filled(8192, Propagating::new(2, &ledger), 11);
    let mut target = filled(8192, Propagating::new(1, &ledger), 12);

    target.assign_from(&source).unwrap();
    assert_eq!(target, source);
    assert_eq!(target.allocator().id, 2);
    assert_eq!(ledger.sole_owner(), Some(2));
}

#[test]
fn test_copy_assignment_keeps_interchangeable_allocator() {
    let ledger = Ledger::new();
    let source = filled(8192, Interchangeable::new(2, &ledger), 11);
    let mut target = filled(8192, Interchangeable::new(1, &ledger), 12);
    let buffer = target.as_bytes().as_ptr();
    let before = ledger.allocation_count();

    target.assign_from(&source).unwrap();
    assert_eq!(target, source);
    assert_eq!(target.allocator().id, 1);
    assert_eq!(target.hash_function().seed(), 11);
    assert_eq!(target.as_bytes().as_ptr(), buffer);
    assert_eq!(ledger.allocation_count(), before);
    assert_eq!(ledger.outstanding_buffers(), 2);
}

#[test]
fn test_copy_assignment_reuses_matching_buffer() {
    let ledger = Ledger::new();
    let source = filled(8192, Sticky::new(2, &ledger), 11);
    let mut target = filled(8192, Sticky::new(1, &ledger), 12);
    let before = ledger.allocation_count();

    target.assign_from(&source).unwrap();
    assert_eq!(ledger.allocation_count(), before);
    assert_eq!(target, source);
}

#[test]
fn test_clone_from_matches_assign_from() {
    let source = Filter::<u64, 2>::from_values(make_u64s(50, 1), Sizing::Bits(4096)).unwrap();
    let mut target = Filter::<u64, 2>::new(100).unwrap();
    target.clone_from(&source);
    assert_eq!(target, source);
}

#[test]
fn test_move_assignment_between_unequal_sticky_allocators_copies() {
    let ledger = Ledger::new();
    let mut source = filled(8192, Sticky::new(2, &ledger), 21);
    let snapshot = source.try_clone().unwrap();
    let mut target = filled(1024, Sticky::new(1, &ledger), 22);

    target.assign_take(&mut source).unwrap();
    assert_eq!(target, snapshot);
    assert_eq!(target.allocator().id, 1);
    assert_eq!(target.hash_function().seed(), 21);
    assert_eq!(source.hash_function().seed(), 22);
    assert_eq!(source.capacity(), 0);
    assert!(source.may_contain(&0));
}

#[test]
fn test_move_assignment_between_unequal_sticky_allocators_with_equal_ranges() {
    let ledger = Ledger::new();
    let mut source = filled(8192, Sticky::new(2, &ledger), 31);
    let snapshot = source.clone_in(Sticky::new(2, &ledger)).unwrap();
    let mut target = filled(8192, Sticky::new(1, &ledger), 32);
    let source_buffer = source.as_bytes().as_ptr();
    let target_buffer = target.as_bytes().as_ptr();
    let before = ledger.allocation_count();

    target.assign_take(&mut source).unwrap();
    assert_eq!(target, snapshot);
    assert_ne!(target.as_bytes().as_ptr(), source_buffer);
    assert_eq!(target.as_bytes().as_ptr(), target_buffer);
    assert_eq!(target.allocator().id, 1);
    assert_eq!(source.capacity(), 0);
    assert_eq!(ledger.allocation_count(), before);

    drop(snapshot);
    assert_eq!(ledger.sole_owner(), Some(1));
    assert_eq!(ledger.outstanding_buffers(), 1);
}

#[test]
fn test_move_assignment_steals_when_possible() {
    let ledger = Ledger::new();

    let mut source = filled(8192, Sticky::new(1, &ledger), 1);
    let mut target = F::with_hasher_in(8, XxHashBuilder::new(), Sticky::new(1, &ledger)).unwrap();
    let before = ledger.allocation_count();
    target.assign_take(&mut source).unwrap();
    assert_eq!(ledger.allocation_count(), before);
    assert_eq!(ledger.outstanding_buffers(), 1);

    let mut source = filled(8192, Propagating::new(2, &ledger), 1);
    let mut target = filled(8, Propagating::new(1, &ledger), 2);
    let before = ledger.allocation_count();
    target.assign_take(&mut source).unwrap();
    assert_eq!(ledger.allocation_count(), before);
    assert_eq!(target.allocator().id, 2);

    let mut source = filled(8192, Interchangeable::new(2, &ledger), 1);
    let mut target = filled(8, Interchangeable::new(1, &ledger), 2);
    let before = ledger.allocation_count();
    target.assign_take(&mut source).unwrap();
    assert_eq!(ledger.allocation_count(), before);
    assert_eq!(target.allocator().id, 1);
}

#[test]
fn test_take_leaves_source_empty() {
    let ledger = Ledger::new();
    let mut source = filled(4096, Sticky::new(3, &ledger), 5);
    let snapshot = source.try_clone().unwrap();
    let taken = source.take();
    assert_eq!(taken, snapshot);
    assert_eq!(source.capacity(), 0);
    assert_eq!(taken.allocator().id, 3);
    drop(source);
    assert_eq!(ledger.outstanding_buffers(), 2);
}

#[test]
fn test_take_in_copies_for_foreign_allocator() {
    let ledger = Ledger::new();
    let mut source = filled(4096, Sticky::new(1, &ledger), 5);
    let snapshot = source.try_clone().unwrap();
    let before = ledger.allocation_count();

    let moved = source.take_in(Sticky::new(2, &ledger)).unwrap();
    assert_eq!(ledger.allocation_count(), before + 1);
    assert_eq!(moved, snapshot);
    assert_eq!(moved.allocator().id, 2);
    assert_eq!(source.capacity(), 0);

    let mut source = moved;
    let again = source.take_in(Sticky::new(2, &ledger)).unwrap();
    assert_eq!(ledger.allocation_count(), before + 1);
    assert_eq!(again, snapshot);
}

#[test]
fn test_swap_with_propagating_allocators() {
    let ledger = Ledger::new();
    let mut a = filled(4096, Propagating::new(1, &ledger), 1);
    let mut b = filled(512, Propagating::new(2, &ledger), 2);
    let (a0, b0) = (a.try_clone().unwrap(), b.try_clone().unwrap());

    a.swap(&mut b);
    assert_eq!(a, b0);
    assert_eq!(b, a0);
    assert_eq!(a.allocator().id, 2);
    assert_eq!(b.allocator().id, 1);
    assert_eq!(a.hash_function().seed(), 2);
}

#[test]
fn test_swap_with_equal_sticky_allocators() {
    let ledger = Ledger::new();
    let mut a = filled(4096, Sticky::new(1, &ledger), 1);
    let mut b = filled(512, Sticky::new(1, &ledger), 2);
    let capacities = (a.capacity(), b.capacity());
    a.swap(&mut b);
    assert_eq!((b.capacity(), a.capacity()), capacities);
}

#[test]
#[should_panic(expected = "unequal non-propagating allocators")]
fn test_swap_with_unequal_sticky_allocators_panics() {
    let ledger = Ledger::new();
    let mut a = filled(64, Sticky::new(1, &ledger), 1);
    let mut b = filled(64, Sticky::new(2, &ledger), 2);
    a.swap(&mut b);
}

#[test]
fn test_rejected_swap_leaves_both_filters_intact() {
    let ledger = Ledger::new();
    let mut a = filled(4096, Sticky::new(1, &ledger), 1);
    let mut b = filled(4096, Sticky::new(2, &ledger), 2);
    let (a0, b0) = (a.as_bytes().to_vec(), b.as_bytes().to_vec());

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| a.swap(&mut b)));
    assert!(outcome.is_err());
    assert_eq!(a.as_bytes(), &a0[..]);
    assert_eq!(b.as_bytes(), &b0[..]);
    assert_eq!((a.allocator().id, b.allocator().id), (1, 2));
    assert_eq!((a.hash_function().seed(), b.hash_function().seed()), (1, 2));

    // Each buffer is still released by the allocator that made it.
    drop(a);
    drop(b);
    assert_eq!(ledger.outstanding_buffers(), 0);
}

#[test]
fn test_swap_with_interchangeable_allocators() {
    let ledger = Ledger::new();
    let mut a = filled(4096, Interchangeable::new(1, &ledger), 1);
    let mut b = filled(512, Interchangeable::new(2, &ledger), 2);
    let (a0, b0) = (a.try_clone().unwrap(), b.try_clone().unwrap());

    a.swap(&mut b);
    assert_eq!(a, b0);
    assert_eq!(b, a0);
    assert_eq!(a.allocator().id, 1);
    assert_eq!(b.allocator().id, 2);
    assert_eq!(a.hash_function().seed(), 2);

    drop((a0, b0));
    drop(a);
    drop(b);
    assert_eq!(ledger.outstanding_buffers(), 0);
}

#[test]
fn test_reset_reuses_buffer_when_range_is_unchanged() {
    let ledger = Ledger::new();
    let mut filter = filled(4096, Sticky::new(1, &ledger), 1);
    let capacity = filter.capacity();
    let before = ledger.allocation_count();

    filter.reset(capacity).unwrap();
    assert_eq!(ledger.allocation_count(), before);
    assert!(filter.as_bytes().iter().all(|&b| b == 0));

    filter.reset(capacity * 4).unwrap();
    assert_eq!(ledger.allocation_count(), before + 1);
    assert_eq!(ledger.outstanding_buffers(), 1);

    filter.reset(0).unwrap();
    assert_eq!(filter.capacity(), 0);
    assert_eq!(ledger.outstanding_buffers(), 0);
}

#[test]
fn test_failed_operations_leave_filter_unchanged() {
    let ledger = Ledger::new();
    let mut filter = filled(1000, Sticky::limited(1, &ledger, 4096), 1);
    let snapshot = filter.clone_in(Sticky::new(1, &ledger)).unwrap();

    let err = filter.reset(1 << 20).unwrap_err();
    assert!(err.is_allocation_failure());
    assert_eq!(filter.capacity(), snapshot.capacity());
    assert_eq!(filter.as_bytes(), snapshot.as_bytes());

    let big = filled(1 << 20, Sticky::new(1, &ledger), 2);
    assert!(filter.assign_from(&big).is_err());
    assert_eq!(filter.as_bytes(), snapshot.as_bytes());
    assert_eq!(filter.hash_function().seed(), 1);

    assert!(filter.reset_for(1, 0.0).is_err());
    assert_eq!(filter.as_bytes(), snapshot.as_bytes());
}

#[test]
fn test_failed_move_leaves_both_unchanged() {
    let ledger = Ledger::new();
    let mut target = filled(1000, Sticky::limited(1, &ledger, 4096), 1);
    let mut source = filled(1 << 20, Sticky::new(2, &ledger), 2);
    let (t0, s0) = (target.as_bytes().to_vec(), source.as_bytes().to_vec());

    assert!(target.assign_take(&mut source).is_err());
    assert_eq!(target.as_bytes(), &t0[..]);
    assert_eq!(source.as_bytes(), &s0[..]);
    assert_eq!(target.hash_function().seed(), 1);
    assert_eq!(source.hash_function().seed(), 2);
}

#[test]
fn test_clear_keeps_capacity() {
    let mut filter = Filter::<u64, 1, Block<u32, 3>, 1>::from_values(make_u64s(100, 2), Sizing::Bits(4096)).unwrap();
    let capacity = filter.capacity();
    filter.clear();
    assert_eq!(filter.capacity(), capacity);
    assert!(filter.as_bytes().iter().all(|&b| b == 0));
    assert!(make_u64s(100, 2).iter().filter(|v| filter.may_contain(*v)).count() == 0);
}
