//! Shared helpers for integration tests.

#![allow(dead_code)]

use bloomforge::alloc::{FilterAllocator, Global, Propagation};
use bloomforge::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::alloc::Layout;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

/// Install a test-writer tracing subscriber once per test binary.
///
/// Set `RUST_LOG=bloomforge=debug` to see storage and sizing events.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Outstanding buffers, keyed by address, with the id of the allocator that made them.
#[derive(Debug, Default)]
pub struct Ledger {
    live: Mutex<HashMap<usize, (u32, usize)>>,
    allocations: Mutex<usize>,
}

impl Ledger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn outstanding_buffers(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub fn outstanding_bytes(&self) -> usize {
        self.live.lock().unwrap().values().map(|&(_, bytes)| bytes).sum()
    }

    pub fn allocation_count(&self) -> usize {
        *self.allocations.lock().unwrap()
    }

    /// Id of the allocator that made the only live buffer.
    pub fn sole_owner(&self) -> Option<u32> {
        let live = self.live.lock().unwrap();
        let mut owners = live.values().map(|&(id, _)| id);
        let first = owners.next()?;
        owners.all(|id| id == first).then_some(first)
    }
}

/// Stateful allocator recording every buffer in a [`Ledger`].
///
/// Instances compare equal when their ids match, or always when `ALWAYS_EQUAL`. Freeing a
/// buffer through an allocator that does not compare equal to its maker panics.
#[derive(Debug, Clone)]
pub struct TrackingAllocator<const PROPAGATE: bool, const ALWAYS_EQUAL: bool> {
    pub id: u32,
    ledger: Arc<Ledger>,
    max_bytes: usize,
}

impl<const PROPAGATE: bool, const ALWAYS_EQUAL: bool> TrackingAllocator<PROPAGATE, ALWAYS_EQUAL> {
    pub fn new(id: u32, ledger: &Arc<Ledger>) -> Self {
        Self {
            id,
            ledger: Arc::clone(ledger),
            max_bytes: usize::MAX,
        }
    }

    /// An allocator refusing any request above `max_bytes`.
    pub fn limited(id: u32, ledger: &Arc<Ledger>, max_bytes: usize) -> Self {
        Self {
            max_bytes,
            ..Self::new(id, ledger)
        }
    }
}

impl<const PROPAGATE: bool, const ALWAYS_EQUAL: bool> PartialEq for TrackingAllocator<PROPAGATE, ALWAYS_EQUAL> {
    fn eq(&self, other: &Self) -> bool {
        ALWAYS_EQUAL || self.id == other.id
    }
}

impl<const PROPAGATE: bool, const ALWAYS_EQUAL: bool> FilterAllocator for TrackingAllocator<PROPAGATE, ALWAYS_EQUAL> {
    const PROPAGATION: Propagation = Propagation::uniform(PROPAGATE, ALWAYS_EQUAL);

    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>> {
        if layout.size() > self.max_bytes {
            return Err(bloomforge::BloomError::allocation_failed(layout.size()));
        }
        let ptr = Global.allocate(layout)?;
        self.ledger
            .live
            .lock()
            .unwrap()
            .insert(ptr.as_ptr() as usize, (self.id, layout.size()));
        *self.ledger.allocations.lock().unwrap() += 1;
        Ok(ptr)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        let (owner, bytes) = self
            .ledger
            .live
            .lock()
            .unwrap()
            .remove(&(ptr.as_ptr() as usize))
            .expect("freeing a buffer this ledger never handed out");
        assert_eq!(bytes, layout.size());
        assert!(
            ALWAYS_EQUAL || owner == self.id,
            "buffer made by allocator {owner} freed by allocator {}",
            self.id
        );
        unsafe { Global.deallocate(ptr, layout) }
    }
}

/// Neither propagates nor compares equal across ids.
pub type Sticky = TrackingAllocator<false, false>;
/// Propagates on copy, move and swap.
pub type Propagating = TrackingAllocator<true, false>;
/// Never propagates but any two instances are interchangeable.
pub type Interchangeable = TrackingAllocator<false, true>;

/// Deterministic pseudo-random integers.
pub fn make_u64s(n: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen()).collect()
}

/// Deterministic pseudo-random strings of 8 to 24 alphanumeric characters.
pub fn make_strings(n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let len = rng.gen_range(8..=24);
            (0..len).map(|_| rng.sample(rand::distributions::Alphanumeric) as char).collect()
        })
        .collect()
}

/// Integers whose low byte is `tag`, so sets made with different tags are disjoint.
pub fn make_tagged_u64s(n: usize, seed: u64, tag: u64) -> Vec<u64> {
    make_u64s(n, seed)
        .into_iter()
        .map(|x| (x & !0xFF) | tag)
        .collect()
}
