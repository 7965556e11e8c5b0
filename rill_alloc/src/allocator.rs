//! The allocator interface frames are carved from.

use std::alloc::Layout;
use std::ptr::NonNull;

use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// An allocator could not satisfy a frame request.
///
/// There is no retry policy at this layer: the error travels back to whoever
/// asked for the frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("MemoryError: cannot allocate frame of {size} bytes (align {align})")]
pub struct AllocError {
    size: usize,
    align: usize,
}

impl AllocError {
    /// Creates an error for a failed request of `layout`.
    #[inline]
    pub const fn new(layout: Layout) -> Self {
        Self {
            size: layout.size(),
            align: layout.align(),
        }
    }

    /// Error for a frame whose packed layout does not fit in `isize`.
    #[inline]
    pub const fn overflow() -> Self {
        Self {
            size: usize::MAX,
            align: 1,
        }
    }

    /// Requested size in bytes.
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Requested alignment in bytes.
    #[inline]
    pub const fn align(&self) -> usize {
        self.align
    }
}

// =============================================================================
// Allocator Traits
// =============================================================================

/// A source of raw memory for suspended frames.
///
/// Implementations are free to keep state; stateful allocators are moved into
/// the frame block itself (see [`crate::Stateful`]) so they are available again
/// when the frame is released.
pub trait FrameAllocator: 'static {
    /// Allocates a block for `layout`. `layout.size()` is never zero.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] when the request cannot be satisfied.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`FrameAllocator::allocate`] on an allocator equal
    /// to `self`, called with the same `layout`, and must not be used again.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// An allocator whose instances are all interchangeable.
///
/// A frame allocated through a stateless allocator stores nothing extra:
/// a fresh instance is built with `Default` at release time.
pub trait StatelessAllocator: FrameAllocator + Default {}

// =============================================================================
// Heap
// =============================================================================

/// The process allocator as a zero-sized, stateless [`FrameAllocator`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Heap;

impl FrameAllocator for Heap {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(layout.size() > 0);
        // SAFETY: frame layouts always include a header, so the size is non-zero.
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::new(layout))
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees `ptr` came from `allocate` with `layout`.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

impl StatelessAllocator for Heap {}
