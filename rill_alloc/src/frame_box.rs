//! Owning pointer to a self-describing frame block.
//!
//! # Memory Layout
//!
//! ```text
//! PackedFrame<F> (repr(C))
//! ┌─────────────────────────────────────────────┐
//! │ FrameHeader: layout, tail, placement, fn?   │
//! ├─────────────────────────────────────────────┤
//! │ frame: F   (may be unsized, e.g. dyn Trait) │
//! └─────────────────────────────────────────────┘
//! [padding][allocator state]   <- stateful placement only
//! ```
//!
//! The header sits at offset zero, so it can be read through a pointer to an
//! erased `PackedFrame<dyn ...>` without knowing the concrete frame type.

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use crate::allocator::AllocError;
use crate::token::{AllocToken, Global};

// =============================================================================
// Frame Header
// =============================================================================

/// Releases a whole frame block: `(base, block_layout, tail_offset)`.
pub type ReleaseFn = unsafe fn(NonNull<u8>, Layout, usize);

/// How a frame block was obtained, and therefore how it is given back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Process allocator, no token supplied.
    Global,
    /// Stateless allocator, re-created at release.
    Stateless,
    /// Stateful allocator stored in the block tail.
    Stateful,
}

impl Placement {
    /// Short name for diagnostics.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Stateless => "stateless",
            Self::Stateful => "stateful",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata stored at the front of every frame block.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Layout of the whole block, header and tail included.
    layout: Layout,
    /// Offset of the allocator tail from the block base.
    tail: usize,
    placement: Placement,
    /// `None` for global placement: the block goes straight back to `std::alloc`.
    release: Option<ReleaseFn>,
}

impl FrameHeader {
    pub(crate) const fn new(
        layout: Layout,
        tail: usize,
        placement: Placement,
        release: Option<ReleaseFn>,
    ) -> Self {
        Self {
            layout,
            tail,
            placement,
            release,
        }
    }

    /// Layout of the whole block.
    #[inline]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Total bytes of the block.
    #[inline]
    pub const fn block_size(&self) -> usize {
        self.layout.size()
    }

    /// How the block was allocated.
    #[inline]
    pub const fn placement(&self) -> Placement {
        self.placement
    }

    /// Offset of the stored allocator, if the block carries one.
    #[inline]
    pub const fn tail_offset(&self) -> Option<usize> {
        match self.placement {
            Placement::Stateful => Some(self.tail),
            Placement::Global | Placement::Stateless => None,
        }
    }

    /// Bytes spent on allocator state inside the block, trailing padding
    /// included. Zero unless the placement is stateful.
    #[inline]
    pub const fn tail_len(&self) -> usize {
        match self.placement {
            Placement::Stateful => self.layout.size() - self.tail,
            Placement::Global | Placement::Stateless => 0,
        }
    }

    /// Whether releasing the block goes through a release function.
    #[inline]
    pub const fn has_release_fn(&self) -> bool {
        self.release.is_some()
    }

    /// Gives the block starting at `base` back to where it came from.
    ///
    /// # Safety
    ///
    /// `base` must be the base of the block this header describes, the frame
    /// inside must already be dropped, and the block must not be used again.
    unsafe fn release_block(&self, base: NonNull<u8>) {
        tracing::trace!(
            size = self.layout.size(),
            placement = %self.placement,
            "frame block released"
        );
        match self.release {
            // SAFETY: global blocks come from `std::alloc::alloc` with `self.layout`.
            None => unsafe { std::alloc::dealloc(base.as_ptr(), self.layout) },
            // SAFETY: the release fn was recorded together with this layout and tail.
            Some(release) => unsafe { release(base, self.layout, self.tail) },
        }
    }
}

// =============================================================================
// Packed Frame
// =============================================================================

/// A frame with its header in front of it.
///
/// Only reachable through [`FrameBox::into_raw`]; it is public so an owner can
/// unsize the raw pointer (`NonNull<PackedFrame<Concrete>>` to
/// `NonNull<PackedFrame<dyn Trait>>`) before handing it back to
/// [`FrameBox::from_raw`].
#[repr(C)]
pub struct PackedFrame<F: ?Sized> {
    header: FrameHeader,
    frame: F,
}

// =============================================================================
// Frame Box
// =============================================================================

/// Unique owner of one frame block.
///
/// Behaves like `Box<F>`, except the allocator used for the block is recorded
/// in the block itself. Dropping the box drops the frame and then releases the
/// block through the recorded placement, even if the frame's destructor panics.
pub struct FrameBox<F: ?Sized> {
    ptr: NonNull<PackedFrame<F>>,
    _owns: PhantomData<PackedFrame<F>>,
}

impl<F> FrameBox<F> {
    /// Places `frame` with the process allocator.
    ///
    /// Aborts through [`std::alloc::handle_alloc_error`] if memory is exhausted,
    /// like `Box::new`.
    pub fn new(frame: F) -> Self {
        match Global.place(frame) {
            Ok(this) => this,
            Err(_) => std::alloc::handle_alloc_error(Layout::new::<PackedFrame<F>>()),
        }
    }

    /// Places `frame` with the process allocator.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the process allocator returns null.
    pub fn try_new(frame: F) -> Result<Self, AllocError> {
        Global.place(frame)
    }

    /// Places `frame` according to `token`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the token's allocator fails.
    pub fn new_in<K: AllocToken>(token: K, frame: F) -> Result<Self, AllocError> {
        token.place(frame)
    }

    /// Block layout for `F` followed by a tail of layout `tail`, and the tail
    /// offset inside the block.
    pub(crate) fn layout_with_tail(tail: Layout) -> Result<(Layout, usize), AllocError> {
        Layout::new::<PackedFrame<F>>()
            .extend(tail)
            .map(|(layout, offset)| (layout.pad_to_align(), offset))
            .map_err(|_| AllocError::overflow())
    }

    /// Writes header and frame into a freshly allocated block.
    ///
    /// # Safety
    ///
    /// `base` must be valid for writes of `header.layout()` bytes, aligned to
    /// `header.layout().align()`, and released only through the returned box.
    pub(crate) unsafe fn write(base: NonNull<u8>, header: FrameHeader, frame: F) -> Self {
        let ptr = base.cast::<PackedFrame<F>>();
        // SAFETY: the caller provides a block large and aligned enough.
        unsafe { ptr.as_ptr().write(PackedFrame { header, frame }) };
        Self {
            ptr,
            _owns: PhantomData,
        }
    }
}

impl<F: ?Sized> FrameBox<F> {
    /// The block header.
    #[inline]
    pub fn header(this: &Self) -> &FrameHeader {
        // SAFETY: the block is live while the box exists; the header is never written after placement.
        unsafe { &(*this.ptr.as_ptr()).header }
    }

    /// Raw pointer to the frame, derived without creating a reference.
    ///
    /// The pointer stays valid until the box is dropped; moving the box does
    /// not move the frame.
    #[inline]
    pub fn as_ptr(this: &Self) -> NonNull<F> {
        // SAFETY: `ptr` is non-null and points to a live block, so the field address is too.
        unsafe { NonNull::new_unchecked(&raw mut (*this.ptr.as_ptr()).frame) }
    }

    /// Consumes the box without releasing the block.
    #[inline]
    pub fn into_raw(this: Self) -> NonNull<PackedFrame<F>> {
        let this = ManuallyDrop::new(this);
        this.ptr
    }

    /// Takes back ownership of a block produced by [`FrameBox::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `into_raw` (possibly unsized since) and must not
    /// be owned by any other box.
    #[inline]
    pub unsafe fn from_raw(ptr: NonNull<PackedFrame<F>>) -> Self {
        Self {
            ptr,
            _owns: PhantomData,
        }
    }
}

impl<F: ?Sized> Deref for FrameBox<F> {
    type Target = F;

    #[inline]
    fn deref(&self) -> &F {
        // SAFETY: unique ownership of a live, initialized block.
        unsafe { &(*self.ptr.as_ptr()).frame }
    }
}

impl<F: ?Sized> DerefMut for FrameBox<F> {
    #[inline]
    fn deref_mut(&mut self) -> &mut F {
        // SAFETY: unique ownership of a live, initialized block.
        unsafe { &mut (*self.ptr.as_ptr()).frame }
    }
}

impl<F: ?Sized> Drop for FrameBox<F> {
    fn drop(&mut self) {
        struct ReleaseOnExit {
            base: NonNull<u8>,
            header: FrameHeader,
        }

        impl Drop for ReleaseOnExit {
            fn drop(&mut self) {
                // SAFETY: runs once, after the frame has been dropped in place.
                unsafe { self.header.release_block(self.base) }
            }
        }

        // SAFETY: the block is live; the header is plain data.
        let header = unsafe { (*self.ptr.as_ptr()).header };
        let _release = ReleaseOnExit {
            base: self.ptr.cast::<u8>(),
            header,
        };
        // SAFETY: the frame is initialized and dropped exactly once.
        unsafe { ptr::drop_in_place(&raw mut (*self.ptr.as_ptr()).frame) };
    }
}

impl<F: ?Sized + fmt::Debug> fmt::Debug for FrameBox<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBox")
            .field("placement", &FrameBox::header(self).placement())
            .field("frame", &&**self)
            .finish()
    }
}
