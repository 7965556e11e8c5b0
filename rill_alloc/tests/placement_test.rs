//! Integration tests for frame placement and release.
//!
//! Covers the three placements end to end: which allocator sees the
//! allocation, which one sees the release, and what the block costs.

use std::alloc::Layout;
use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::NonNull;

use rill_alloc::{
    AllocError, AllocToken, FrameAllocator, FrameBox, Global, Heap, Placement, Stateful,
    Stateless, StatelessAllocator, Tracking,
};

// =============================================================================
// Helpers
// =============================================================================

thread_local! {
    static STATELESS_ALLOCS: Cell<usize> = const { Cell::new(0) };
    static STATELESS_FREES: Cell<usize> = const { Cell::new(0) };
}

/// Stateless allocator counting through thread-locals.
#[derive(Debug, Default)]
struct Counted;

impl FrameAllocator for Counted {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        STATELESS_ALLOCS.with(|c| c.set(c.get() + 1));
        Heap.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        STATELESS_FREES.with(|c| c.set(c.get() + 1));
        unsafe { Heap.deallocate(ptr, layout) }
    }
}

impl StatelessAllocator for Counted {}

struct PanicOnDrop;

impl Drop for PanicOnDrop {
    fn drop(&mut self) {
        panic!("frame destructor failed");
    }
}

// =============================================================================
// Stateful Placement
// =============================================================================

#[test]
fn test_stateful_release_uses_stored_allocator() {
    let tracking = Tracking::new();
    let frame = FrameBox::new_in(Stateful(tracking.clone()), [7u64; 4]).unwrap();
    assert_eq!(tracking.stats().allocations(), 1);
    assert_eq!(FrameBox::header(&frame).placement(), Placement::Stateful);
    assert_eq!(
        FrameBox::header(&frame).tail_len(),
        std::mem::size_of::<Tracking>()
    );

    drop(frame);
    assert_eq!(tracking.stats().deallocations(), 1);
    assert!(tracking.stats().is_balanced());
}

#[test]
fn test_stateful_tail_costs_allocator_size() {
    let global = FrameBox::new(0u64);
    let tracked = FrameBox::new_in(Stateful(Tracking::new()), 0u64).unwrap();
    let extra = FrameBox::header(&tracked).block_size() - FrameBox::header(&global).block_size();
    assert!(extra >= std::mem::size_of::<Tracking>());
    assert!(extra < std::mem::size_of::<Tracking>() + std::mem::align_of::<Tracking>());
}

#[test]
fn test_budget_exhaustion_reports_alloc_error() {
    let tracking = Tracking::with_budget(8);
    let err = FrameBox::new_in(Stateful(tracking.clone()), [0u8; 64]).unwrap_err();
    assert!(err.size() > 64);
    assert_eq!(tracking.stats().failures(), 1);
    assert_eq!(tracking.stats().allocations(), 0);
}

// =============================================================================
// Stateless Placement
// =============================================================================

#[test]
fn test_stateless_release_synthesizes_allocator() {
    let allocs = STATELESS_ALLOCS.with(Cell::get);
    let frees = STATELESS_FREES.with(Cell::get);

    let frame = FrameBox::new_in(Stateless::<Counted>::new(), String::from("frame")).unwrap();
    assert_eq!(STATELESS_ALLOCS.with(Cell::get), allocs + 1);
    assert_eq!(FrameBox::header(&frame).tail_len(), 0);
    drop(frame);
    assert_eq!(STATELESS_FREES.with(Cell::get), frees + 1);
}

// =============================================================================
// Global Placement
// =============================================================================

#[test]
fn test_global_try_new() {
    let frame = FrameBox::try_new(vec![1u8, 2, 3]).unwrap();
    assert_eq!(frame.len(), 3);
    assert_eq!(Global.placement(), FrameBox::header(&frame).placement());
}

// =============================================================================
// Failure During Drop
// =============================================================================

#[test]
fn test_block_released_when_destructor_panics() {
    let tracking = Tracking::new();
    let frame = FrameBox::new_in(Stateful(tracking.clone()), PanicOnDrop).unwrap();
    let result = catch_unwind(AssertUnwindSafe(move || drop(frame)));
    assert!(result.is_err());
    assert!(tracking.stats().is_balanced());
}
