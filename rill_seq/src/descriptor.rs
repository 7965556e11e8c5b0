//! Stack descriptors: the virtual call stack of nested sequences.
//!
//! Every frame carries one descriptor. A chain of delegating frames looks
//! like this:
//!
//! ```text
//!   Sequence handle
//!        │ owns
//!        ▼
//!   ┌──────────────┐  child  ┌──────────────┐  child  ┌──────────────┐
//!   │ Bottom       │────────►│ Nested (1)   │────────►│ Nested (2)   │
//!   │  top ────────┼─────────┼──────────────┼────────►│              │
//!   │  value       │◄─parent─│ bottom,parent│◄─parent─│ bottom,parent│
//!   └──────────────┘         └──────────────┘         └──────────────┘
//! ```
//!
//! `top` on the bottom frame always names the frame to resume, so resuming
//! costs the same at any depth. A nested frame reaches `top` in one hop
//! through its cached `bottom`; no operation ever walks `parent` links.

use std::ptr::NonNull;

use rill_alloc::FrameBox;

use crate::frame::{FramePtr, OwnedFrame};
use crate::stats::ChainStats;

// =============================================================================
// Descriptor
// =============================================================================

/// Per-frame control structure.
pub(crate) enum StackDescriptor<T> {
    /// Outermost frame of a chain.
    Bottom {
        /// Frame to resume next; `None` means the bottom frame itself.
        top: Option<FramePtr<T>>,
        /// Value slot of the frame that last yielded. Valid only while that
        /// frame is suspended at the yield.
        value: Option<NonNull<Option<T>>>,
    },
    /// Frame attached to a chain by delegation.
    Nested {
        /// Outermost frame of the chain.
        bottom: FramePtr<T>,
        /// Frame to resume when this one completes.
        parent: FramePtr<T>,
        /// Levels below the bottom frame (bottom is 0).
        depth: usize,
    },
}

impl<T> Clone for StackDescriptor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StackDescriptor<T> {}

impl<T> StackDescriptor<T> {
    /// Descriptor of a frame that has not been delegated to.
    #[inline]
    pub(crate) const fn bottom() -> Self {
        Self::Bottom {
            top: None,
            value: None,
        }
    }

    #[inline]
    pub(crate) const fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom { .. })
    }

    #[inline]
    pub(crate) const fn depth(&self) -> usize {
        match self {
            Self::Bottom { .. } => 0,
            Self::Nested { depth, .. } => *depth,
        }
    }
}

/// Identity comparison ignoring vtables.
#[inline]
pub(crate) fn same_frame<T>(a: FramePtr<T>, b: FramePtr<T>) -> bool {
    a.cast::<u8>() == b.cast::<u8>()
}

/// # Safety
///
/// `frame` must point to a live frame.
#[inline]
pub(crate) unsafe fn descriptor<T>(frame: FramePtr<T>) -> StackDescriptor<T> {
    // SAFETY: guaranteed by the caller; the descriptor is plain data.
    unsafe { (*frame.as_ptr()).descriptor }
}

/// # Safety
///
/// `frame` must point to a live frame that no reference currently covers.
#[inline]
unsafe fn descriptor_mut<'a, T>(frame: FramePtr<T>) -> &'a mut StackDescriptor<T> {
    // SAFETY: guaranteed by the caller.
    unsafe { &mut (*frame.as_ptr()).descriptor }
}

// =============================================================================
// Bottom Accessors
// =============================================================================

/// Active frame of the chain whose bottom frame is `bottom`.
///
/// # Safety
///
/// `bottom` must point to a live bottom frame.
#[inline]
unsafe fn chain_top<T>(bottom: FramePtr<T>) -> FramePtr<T> {
    // SAFETY: guaranteed by the caller.
    match unsafe { descriptor(bottom) } {
        StackDescriptor::Bottom { top: Some(top), .. } => top,
        _ => bottom,
    }
}

/// # Safety
///
/// `bottom` must point to a live bottom frame; `frame` must belong to its chain.
#[inline]
unsafe fn set_top<T>(bottom: FramePtr<T>, frame: FramePtr<T>) {
    // SAFETY: guaranteed by the caller.
    if let StackDescriptor::Bottom { top, .. } = unsafe { descriptor_mut(bottom) } {
        *top = Some(frame);
    }
}

/// Points the chain's value slot at `slot`, or clears it.
///
/// # Safety
///
/// `bottom` must point to a live bottom frame; `slot`, if any, must be the
/// value slot of the chain's top frame.
#[inline]
pub(crate) unsafe fn set_value<T>(bottom: FramePtr<T>, slot: Option<NonNull<Option<T>>>) {
    // SAFETY: guaranteed by the caller.
    if let StackDescriptor::Bottom { value, .. } = unsafe { descriptor_mut(bottom) } {
        *value = slot;
    }
}

/// The chain's value slot.
///
/// # Safety
///
/// `bottom` must point to a live frame.
#[inline]
pub(crate) unsafe fn value<T>(bottom: FramePtr<T>) -> Option<NonNull<Option<T>>> {
    // SAFETY: guaranteed by the caller.
    match unsafe { descriptor(bottom) } {
        StackDescriptor::Bottom { value, .. } => value,
        StackDescriptor::Nested { .. } => None,
    }
}

// =============================================================================
// Stack Operations
// =============================================================================

/// The currently resumable frame of `frame`'s chain. At most one link hop.
///
/// # Safety
///
/// `frame` must point to a live frame of a well-formed chain.
#[inline]
pub(crate) unsafe fn top<T>(frame: FramePtr<T>, stats: &mut ChainStats) -> FramePtr<T> {
    // SAFETY: guaranteed by the caller.
    match unsafe { descriptor(frame) } {
        StackDescriptor::Bottom { top, .. } => top.unwrap_or(frame),
        StackDescriptor::Nested { bottom, .. } => {
            stats.link_hops += 1;
            // SAFETY: the cached bottom outlives every frame of its chain.
            unsafe { chain_top(bottom) }
        }
    }
}

/// Attaches `sub` below `current`, which must be its chain's active frame.
///
/// `current` takes ownership of `sub` and `sub` becomes the chain's top.
///
/// # Safety
///
/// `current` must point to a live frame of a well-formed chain and be its
/// top; no references into the chain may be live.
pub(crate) unsafe fn push<T>(current: FramePtr<T>, sub: OwnedFrame<T>, stats: &mut ChainStats) {
    // SAFETY: guaranteed by the caller.
    let (bottom, depth) = match unsafe { descriptor(current) } {
        StackDescriptor::Bottom { .. } => (current, 0),
        StackDescriptor::Nested { bottom, depth, .. } => {
            stats.link_hops += 1;
            (bottom, depth)
        }
    };
    // SAFETY: `bottom` is the live bottom of `current`'s chain.
    debug_assert!(same_frame(unsafe { chain_top(bottom) }, current));

    let sub_ptr = FrameBox::as_ptr(&sub);
    // SAFETY: `sub` is owned here and not yet reachable from any chain.
    unsafe {
        *descriptor_mut(sub_ptr) = StackDescriptor::Nested {
            bottom,
            parent: current,
            depth: depth + 1,
        };
    }
    // SAFETY: `current` is live; moving the box does not move the frame.
    unsafe {
        debug_assert!((*current.as_ptr()).child.is_none());
        (*current.as_ptr()).child = Some(sub);
        set_top(bottom, sub_ptr);
    }
    stats.record_push(depth + 1);
    tracing::trace!(depth = depth + 1, "nested frame pushed");
}

/// Detaches a completed frame from the top of its chain.
///
/// Returns the parent to resume, or `None` when `frame` is the bottom and the
/// whole chain is done. The completed frame stays owned by its parent's child
/// link until the caller takes it out.
///
/// # Safety
///
/// `frame` must point to the live top frame of a well-formed chain.
pub(crate) unsafe fn pop<T>(frame: FramePtr<T>, stats: &mut ChainStats) -> Option<FramePtr<T>> {
    // SAFETY: guaranteed by the caller.
    match unsafe { descriptor(frame) } {
        StackDescriptor::Bottom { .. } => None,
        StackDescriptor::Nested {
            bottom,
            parent,
            depth,
        } => {
            stats.link_hops += 1;
            // SAFETY: `bottom` outlives the chain; `parent` is a live chain member.
            unsafe { set_top(bottom, parent) };
            stats.record_pop(depth - 1);
            tracing::trace!(depth = depth - 1, "nested frame popped");
            Some(parent)
        }
    }
}

/// Releases every frame above `bottom`, innermost first.
///
/// Each frame is dropped as if abandoned at its suspension point. Returns
/// the number of frames released; `bottom` itself is left to its owner.
///
/// # Safety
///
/// `bottom` must point to a live bottom frame that is not being resumed; no
/// references into the chain may be live.
pub(crate) unsafe fn unwind<T>(bottom: FramePtr<T>) -> usize {
    let mut released = 0;
    loop {
        // SAFETY: guaranteed by the caller.
        let top = unsafe { chain_top(bottom) };
        if same_frame(top, bottom) {
            break;
        }
        // SAFETY: every non-bottom chain member is a live nested frame.
        let StackDescriptor::Nested { parent, .. } = (unsafe { descriptor(top) }) else {
            break;
        };
        // SAFETY: `parent` owns `top` through its child link.
        let child = unsafe {
            set_top(bottom, parent);
            (*parent.as_ptr()).child.take()
        };
        drop(child);
        released += 1;
    }
    released
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::IterBody;
    use crate::frame::place_global;

    fn frame() -> OwnedFrame<u32> {
        place_global(IterBody::new(0..1u32))
    }

    /// Bottom frame plus `levels` nested frames; returns every frame pointer,
    /// bottom first.
    fn chain(
        bottom: &OwnedFrame<u32>,
        levels: usize,
        stats: &mut ChainStats,
    ) -> Vec<FramePtr<u32>> {
        let mut ptrs = vec![FrameBox::as_ptr(bottom)];
        for _ in 0..levels {
            let sub = frame();
            let sub_ptr = FrameBox::as_ptr(&sub);
            let current = *ptrs.last().unwrap();
            unsafe { push(current, sub, stats) };
            ptrs.push(sub_ptr);
        }
        ptrs
    }

    #[test]
    fn test_push_links_bottom_parent_and_depth() {
        let bottom = frame();
        let mut stats = ChainStats::default();
        let ptrs = chain(&bottom, 3, &mut stats);

        for (depth, &ptr) in ptrs.iter().enumerate().skip(1) {
            let StackDescriptor::Nested {
                bottom: b,
                parent,
                depth: d,
            } = (unsafe { descriptor(ptr) })
            else {
                panic!("nested frame has a bottom descriptor");
            };
            assert!(same_frame(b, ptrs[0]));
            assert!(same_frame(parent, ptrs[depth - 1]));
            assert_eq!(d, depth);
        }
        assert!(unsafe { descriptor(ptrs[0]) }.is_bottom());
        assert_eq!((stats.pushes, stats.depth, stats.max_depth), (3, 3, 3));
        unsafe { unwind(ptrs[0]) };
    }

    #[test]
    fn test_top_from_nested_frame_takes_one_hop() {
        let bottom = frame();
        let mut stats = ChainStats::default();
        let ptrs = chain(&bottom, 3, &mut stats);

        let before = stats.link_hops;
        let from_bottom = unsafe { top(ptrs[0], &mut stats) };
        assert_eq!(stats.link_hops, before);
        assert!(same_frame(from_bottom, ptrs[3]));

        for &nested in &ptrs[1..] {
            let before = stats.link_hops;
            let found = unsafe { top(nested, &mut stats) };
            assert!(same_frame(found, from_bottom));
            assert_eq!(stats.link_hops - before, 1);
        }
        unsafe { unwind(ptrs[0]) };
    }

    #[test]
    fn test_pop_retargets_bottom_to_parent() {
        let bottom = frame();
        let mut stats = ChainStats::default();
        let ptrs = chain(&bottom, 3, &mut stats);

        let parent = unsafe { pop(ptrs[3], &mut stats) }.unwrap();
        assert!(same_frame(parent, ptrs[2]));
        assert!(same_frame(unsafe { top(ptrs[0], &mut stats) }, ptrs[2]));
        assert_eq!((stats.pops, stats.depth), (1, 2));

        let popped = unsafe { (*parent.as_ptr()).child.take() };
        assert!(popped.is_some());
        drop(popped);
        assert_eq!(unsafe { unwind(ptrs[0]) }, 2);
    }

    #[test]
    fn test_pop_on_bottom_is_sentinel() {
        let bottom = frame();
        let mut stats = ChainStats::default();
        assert!(unsafe { pop(FrameBox::as_ptr(&bottom), &mut stats) }.is_none());
        assert_eq!(stats.pops, 0);
    }

    #[test]
    fn test_unwind_releases_nested_frames() {
        let bottom = frame();
        let mut stats = ChainStats::default();
        let ptrs = chain(&bottom, 3, &mut stats);

        assert_eq!(unsafe { unwind(ptrs[0]) }, 3);
        assert!(same_frame(unsafe { top(ptrs[0], &mut stats) }, ptrs[0]));
        assert!(bottom.child.is_none());
        assert_eq!(unsafe { unwind(ptrs[0]) }, 0);
    }

    #[test]
    fn test_value_slot_lives_on_bottom() {
        let bottom = frame();
        let mut stats = ChainStats::default();
        let ptrs = chain(&bottom, 1, &mut stats);

        let slot = unsafe { &raw mut (*ptrs[1].as_ptr()).current };
        unsafe {
            *slot = Some(7);
            set_value(ptrs[0], Some(NonNull::new_unchecked(slot)));
            set_value(ptrs[1], None);
        }
        assert_eq!(unsafe { value(ptrs[0]) }, NonNull::new(slot));
        assert_eq!(unsafe { value(ptrs[1]) }, None);

        unsafe { set_value(ptrs[0], None) };
        assert_eq!(unsafe { value(ptrs[0]) }, None);
        unsafe { unwind(ptrs[0]) };
    }
}
