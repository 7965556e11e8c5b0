//! Allocator tokens: how a frame block is obtained and later returned.
//!
//! A token is passed as the leading argument of a frame constructor. Each
//! token kind decides what, if anything, is stored next to the frame:
//!
//! | Token          | Tail                  | Release path                    |
//! |----------------|-----------------------|---------------------------------|
//! | [`Global`]     | none                  | `std::alloc::dealloc`           |
//! | [`Stateless`]  | none                  | thunk, `A::default()`           |
//! | [`Stateful`]   | `A`, aligned          | thunk, reads `A` from the tail  |

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::allocator::{AllocError, FrameAllocator, StatelessAllocator};
use crate::frame_box::{FrameBox, FrameHeader, Placement};

/// Decides where a frame block comes from.
pub trait AllocToken {
    /// Allocates a block for `frame` and moves the frame into it.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the underlying allocator fails; `frame` is
    /// dropped in that case.
    fn place<F>(self, frame: F) -> Result<FrameBox<F>, AllocError>;

    /// The placement this token produces.
    fn placement(&self) -> Placement;
}

// =============================================================================
// Global
// =============================================================================

/// No allocator supplied: use the process allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Global;

impl AllocToken for Global {
    fn place<F>(self, frame: F) -> Result<FrameBox<F>, AllocError> {
        let (layout, tail) = FrameBox::<F>::layout_with_tail(Layout::new::<()>())?;
        // SAFETY: the layout includes the header and is never zero-sized.
        let base = NonNull::new(unsafe { std::alloc::alloc(layout) })
            .ok_or(AllocError::new(layout))?;
        tracing::trace!(size = layout.size(), "frame placed (global)");
        let header = FrameHeader::new(layout, tail, Placement::Global, None);
        // SAFETY: `base` was just allocated with `layout`.
        Ok(unsafe { FrameBox::write(base, header, frame) })
    }

    #[inline]
    fn placement(&self) -> Placement {
        Placement::Global
    }
}

// =============================================================================
// Stateless
// =============================================================================

/// Token for a [`StatelessAllocator`]; nothing is stored with the frame.
pub struct Stateless<A>(PhantomData<fn() -> A>);

impl<A: StatelessAllocator> Stateless<A> {
    /// Creates the token.
    #[inline]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<A: StatelessAllocator> Default for Stateless<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Stateless<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for Stateless<A> {}

impl<A> fmt::Debug for Stateless<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stateless<{}>", std::any::type_name::<A>())
    }
}

/// # Safety
///
/// `base` must have been allocated by an instance of `A` with `layout`.
unsafe fn release_stateless<A: StatelessAllocator>(base: NonNull<u8>, layout: Layout, _tail: usize) {
    // SAFETY: all `A` are interchangeable, so a fresh one may release the block.
    unsafe { A::default().deallocate(base, layout) }
}

impl<A: StatelessAllocator> AllocToken for Stateless<A> {
    fn place<F>(self, frame: F) -> Result<FrameBox<F>, AllocError> {
        let (layout, tail) = FrameBox::<F>::layout_with_tail(Layout::new::<()>())?;
        let base = A::default().allocate(layout)?;
        tracing::trace!(size = layout.size(), "frame placed (stateless)");
        let header = FrameHeader::new(
            layout,
            tail,
            Placement::Stateless,
            Some(release_stateless::<A>),
        );
        // SAFETY: `base` was just allocated with `layout`.
        Ok(unsafe { FrameBox::write(base, header, frame) })
    }

    #[inline]
    fn placement(&self) -> Placement {
        Placement::Stateless
    }
}

// =============================================================================
// Stateful
// =============================================================================

/// Token owning an allocator instance that travels inside the frame block.
#[derive(Debug, Clone)]
pub struct Stateful<A>(pub A);

/// # Safety
///
/// `base` must be a stateful block of `layout` whose tail at `tail` holds the
/// initialized allocator that produced it.
unsafe fn release_stateful<A: FrameAllocator>(base: NonNull<u8>, layout: Layout, tail: usize) {
    // SAFETY: the tail was written at placement time, aligned for `A`; it is read exactly once.
    let alloc = unsafe { base.as_ptr().add(tail).cast::<A>().read() };
    // SAFETY: `alloc` is the allocator that produced the block.
    unsafe { alloc.deallocate(base, layout) }
}

impl<A: FrameAllocator> AllocToken for Stateful<A> {
    fn place<F>(self, frame: F) -> Result<FrameBox<F>, AllocError> {
        let (layout, tail) = FrameBox::<F>::layout_with_tail(Layout::new::<A>())?;
        let base = self.0.allocate(layout)?;
        tracing::trace!(size = layout.size(), tail, "frame placed (stateful)");
        let header = FrameHeader::new(
            layout,
            tail,
            Placement::Stateful,
            Some(release_stateful::<A>),
        );
        // SAFETY: `tail` is inside the block and aligned for `A` by `Layout::extend`.
        unsafe { base.as_ptr().add(tail).cast::<A>().write(self.0) };
        // SAFETY: `base` was just allocated with `layout`.
        Ok(unsafe { FrameBox::write(base, header, frame) })
    }

    #[inline]
    fn placement(&self) -> Placement {
        Placement::Stateful
    }
}
