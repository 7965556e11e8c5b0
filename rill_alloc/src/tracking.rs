//! A counting allocator for teardown and exhaustion checks.
//!
//! `Tracking` is a stateful [`FrameAllocator`]: every frame placed with
//! [`crate::Stateful`]`(tracking.clone())` carries a handle to the same
//! [`AllocStats`], so the counts stay accurate no matter which frame of a
//! chain is released first.

use std::alloc::Layout;
use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::allocator::{AllocError, FrameAllocator, Heap};

// =============================================================================
// Statistics
// =============================================================================

/// Shared allocation counters.
#[derive(Default)]
pub struct AllocStats {
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    failures: Cell<usize>,
    live_bytes: Cell<usize>,
    peak_bytes: Cell<usize>,
}

impl AllocStats {
    /// Successful allocations so far.
    #[inline]
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Deallocations so far.
    #[inline]
    pub fn deallocations(&self) -> usize {
        self.deallocations.get()
    }

    /// Requests refused because of the budget.
    #[inline]
    pub fn failures(&self) -> usize {
        self.failures.get()
    }

    /// Blocks currently allocated.
    #[inline]
    pub fn live_blocks(&self) -> usize {
        self.allocations() - self.deallocations()
    }

    /// Bytes currently allocated.
    #[inline]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }

    /// Highest `live_bytes` observed.
    #[inline]
    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.get()
    }

    /// True when every allocation has been matched by a deallocation.
    #[inline]
    pub fn is_balanced(&self) -> bool {
        self.live_blocks() == 0 && self.live_bytes() == 0
    }

    fn record_alloc(&self, size: usize) {
        self.allocations.set(self.allocations.get() + 1);
        let live = self.live_bytes.get() + size;
        self.live_bytes.set(live);
        if live > self.peak_bytes.get() {
            self.peak_bytes.set(live);
        }
    }

    fn record_dealloc(&self, size: usize) {
        self.deallocations.set(self.deallocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get().saturating_sub(size));
    }
}

impl fmt::Debug for AllocStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocStats")
            .field("allocations", &self.allocations())
            .field("deallocations", &self.deallocations())
            .field("failures", &self.failures())
            .field("live_bytes", &self.live_bytes())
            .field("peak_bytes", &self.peak_bytes())
            .finish()
    }
}

// =============================================================================
// Tracking Allocator
// =============================================================================

/// Heap-backed allocator that counts traffic and can enforce a byte budget.
#[derive(Debug, Clone, Default)]
pub struct Tracking {
    stats: Rc<AllocStats>,
    /// Maximum live bytes; `None` is unlimited.
    budget: Option<usize>,
}

impl Tracking {
    /// Unlimited tracking allocator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator that refuses requests once `bytes` would be live.
    #[inline]
    pub fn with_budget(bytes: usize) -> Self {
        Self {
            stats: Rc::default(),
            budget: Some(bytes),
        }
    }

    /// The shared counters.
    #[inline]
    pub fn stats(&self) -> &AllocStats {
        &self.stats
    }

    /// Another handle to the shared counters.
    #[inline]
    pub fn shared_stats(&self) -> Rc<AllocStats> {
        Rc::clone(&self.stats)
    }

    /// The configured budget.
    #[inline]
    pub fn budget(&self) -> Option<usize> {
        self.budget
    }
}

impl FrameAllocator for Tracking {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if let Some(budget) = self.budget {
            if self.stats.live_bytes() + layout.size() > budget {
                self.stats.failures.set(self.stats.failures() + 1);
                tracing::debug!(
                    size = layout.size(),
                    live = self.stats.live_bytes(),
                    budget,
                    "frame allocation refused"
                );
                return Err(AllocError::new(layout));
            }
        }
        let ptr = Heap.allocate(layout)?;
        self.stats.record_alloc(layout.size());
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from the caller; blocks come from `Heap`.
        unsafe { Heap.deallocate(ptr, layout) };
        self.stats.record_dealloc(layout.size());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(size: usize) -> Layout {
        Layout::from_size_align(size, 8).unwrap()
    }

    #[test]
    fn test_counts_and_peak() {
        let t = Tracking::new();
        let a = t.allocate(layout(64)).unwrap();
        let b = t.allocate(layout(32)).unwrap();
        assert_eq!(t.stats().allocations(), 2);
        assert_eq!(t.stats().live_bytes(), 96);
        unsafe { t.deallocate(a, layout(64)) };
        unsafe { t.deallocate(b, layout(32)) };
        assert_eq!(t.stats().deallocations(), 2);
        assert_eq!(t.stats().peak_bytes(), 96);
        assert!(t.stats().is_balanced());
    }

    #[test]
    fn test_budget_refuses_and_recovers() {
        let t = Tracking::with_budget(100);
        let a = t.allocate(layout(80)).unwrap();
        assert!(t.allocate(layout(40)).is_err());
        assert_eq!(t.stats().failures(), 1);
        unsafe { t.deallocate(a, layout(80)) };
        let b = t.allocate(layout(40)).unwrap();
        unsafe { t.deallocate(b, layout(40)) };
        assert!(t.stats().is_balanced());
    }

    #[test]
    fn test_clones_share_counters() {
        let t = Tracking::new();
        let other = t.clone();
        let p = other.allocate(layout(16)).unwrap();
        assert_eq!(t.stats().allocations(), 1);
        unsafe { t.deallocate(p, layout(16)) };
        assert!(other.stats().is_balanced());
        assert_eq!(Rc::strong_count(&t.shared_stats()), 3);
    }
}
