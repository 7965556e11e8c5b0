//! Frames and the resume state machine.
//!
//! A frame is one suspended computation: the user body (its locals and
//! resume point), a slot for the value it last yielded, a slot for a fault
//! it raised while nested, its stack descriptor, and the nested frame it is
//! currently delegating to.
//!
//! # Memory Layout
//!
//! ```text
//! PackedFrame (rill_alloc)
//! ┌───────────────────────────────────────────────┐
//! │ FrameHeader                                   │
//! ├───────────────────────────────────────────────┤
//! │ FrameCell                                     │
//! │   descriptor: Bottom{top,value} | Nested{..}  │
//! │   state:      FrameState                      │
//! │   current:    Option<T>                       │
//! │   exception:  Option<SeqError>                │
//! │   child:      Option<OwnedFrame<T>>           │
//! │   body:       B  (dyn Body<T> once erased)    │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! `child` is declared before `body`, so a frame always drops the frame it
//! delegates to before its own locals.

use std::ptr::NonNull;

use rill_alloc::{AllocError, AllocToken, FrameBox, PackedFrame};

use crate::body::{Body, Step};
use crate::config::ChainConfig;
use crate::descriptor::{self, StackDescriptor};
use crate::error::{ProtocolViolation, SeqError, SeqResult, violation};
use crate::state::FrameState;
use crate::stats::ChainStats;

// =============================================================================
// Frame Types
// =============================================================================

/// One suspended computation.
pub(crate) struct FrameCell<T, B: ?Sized> {
    pub(crate) descriptor: StackDescriptor<T>,
    pub(crate) state: FrameState,
    pub(crate) current: Option<T>,
    /// Fault raised while nested; taken by the parent when this frame is popped.
    pub(crate) exception: Option<SeqError>,
    pub(crate) child: Option<OwnedFrame<T>>,
    pub(crate) body: B,
}

/// A frame whose body type has been erased.
pub(crate) type ErasedFrame<T> = FrameCell<T, dyn Body<T>>;

/// Non-owning handle to a frame of a chain.
pub(crate) type FramePtr<T> = NonNull<ErasedFrame<T>>;

/// Owning handle to a frame.
pub(crate) type OwnedFrame<T> = FrameBox<ErasedFrame<T>>;

impl<T, B> FrameCell<T, B> {
    fn new(body: B) -> Self {
        Self {
            descriptor: StackDescriptor::bottom(),
            state: FrameState::Created,
            current: None,
            exception: None,
            child: None,
            body,
        }
    }
}

fn erase<T, B: Body<T> + 'static>(frame: FrameBox<FrameCell<T, B>>) -> OwnedFrame<T> {
    let raw = FrameBox::into_raw(frame);
    let raw: NonNull<PackedFrame<ErasedFrame<T>>> = raw;
    // SAFETY: `raw` comes straight from `into_raw`; only the pointer metadata changed.
    unsafe { FrameBox::from_raw(raw) }
}

/// Allocates a frame for `body` with the process allocator, aborting on
/// exhaustion.
pub(crate) fn place_global<T, B: Body<T> + 'static>(body: B) -> OwnedFrame<T> {
    erase(FrameBox::new(FrameCell::new(body)))
}

/// Allocates a frame for `body` as directed by `token`.
pub(crate) fn place_in<T, B, K>(token: K, body: B) -> Result<OwnedFrame<T>, AllocError>
where
    B: Body<T> + 'static,
    K: AllocToken,
{
    FrameBox::new_in(token, FrameCell::new(body)).map(erase)
}

// =============================================================================
// Value Slot
// =============================================================================

/// The chain's current value, if a frame is suspended at a yield.
///
/// # Safety
///
/// `bottom` must point to a live bottom frame with no chain mutation until
/// the returned reference is dropped.
pub(crate) unsafe fn current_value<'a, T>(bottom: FramePtr<T>) -> Option<&'a T> {
    // SAFETY: the slot belongs to the top frame, which stays put while suspended.
    unsafe { descriptor::value(bottom).and_then(|slot| (*slot.as_ptr()).as_ref()) }
}

/// Moves the chain's current value out of its slot.
///
/// # Safety
///
/// Same as [`current_value`].
pub(crate) unsafe fn take_value<T>(bottom: FramePtr<T>) -> Option<T> {
    // SAFETY: see `current_value`.
    unsafe { descriptor::value(bottom).and_then(|slot| (*slot.as_ptr()).take()) }
}

// =============================================================================
// Resume
// =============================================================================

/// Outcome of driving a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resumed {
    /// A frame suspended with a value in the chain's value slot.
    Yielded,
    /// The bottom frame completed; no further values.
    Finished,
}

/// Drives the chain until a value is produced, the chain completes, or a
/// fault escapes the bottom frame.
///
/// One call may cross any number of nested completions and delegations;
/// only a yield or the end of the chain returns to the caller.
///
/// # Safety
///
/// `bottom` must point to the live bottom frame of a chain exclusively owned
/// by the caller, with no references into the chain live during the call.
pub(crate) unsafe fn advance_chain<T>(
    bottom: FramePtr<T>,
    config: &ChainConfig,
    stats: &mut ChainStats,
) -> SeqResult<Resumed> {
    stats.advances += 1;
    // SAFETY: guaranteed by the caller.
    unsafe { descriptor::set_value(bottom, None) };
    let mut pending: Option<SeqError> = None;

    loop {
        // SAFETY: the chain is well formed; `top` is one of its live frames.
        let top = unsafe { descriptor::top(bottom, stats) };

        let step = {
            // SAFETY: no other reference into the chain is live.
            let frame = unsafe { &mut *top.as_ptr() };
            match frame.state {
                FrameState::Running => violation(ProtocolViolation::Reentered),
                FrameState::Exhausted | FrameState::Faulted => {
                    return pending.map_or(Ok(Resumed::Finished), Err);
                }
                FrameState::Created | FrameState::Suspended => {}
            }
            frame.state = FrameState::Running;
            frame.current = None;
            stats.resumes += 1;
            match pending.take() {
                Some(fault) => frame.body.resume_with_fault(fault),
                None => frame.body.resume(),
            }
        };

        match step {
            Ok(Step::Yield(value)) => {
                // SAFETY: `top` is live and no reference into it is held.
                unsafe { suspend_with_value(top, bottom, value) };
                return Ok(Resumed::Yielded);
            }
            Ok(Step::Delegate(target)) => {
                // SAFETY: `top` is live.
                unsafe { (*top.as_ptr()).state = FrameState::Suspended };
                match target.into_frame() {
                    Ok(Some(sub)) => {
                        // SAFETY: `top` is live.
                        let depth = unsafe { descriptor::descriptor(top) }.depth() + 1;
                        if config.allows_depth(depth) {
                            // SAFETY: `top` is the chain's active frame.
                            unsafe { descriptor::push(top, sub, stats) };
                        } else {
                            tracing::debug!(depth, limit = config.max_depth, "delegation too deep");
                            drop(sub);
                            pending = Some(SeqError::DepthExceeded {
                                limit: config.max_depth,
                            });
                        }
                    }
                    // Nothing to delegate to: resume the delegating frame.
                    Ok(None) => {}
                    Err(fault) => pending = Some(fault),
                }
                continue;
            }
            Ok(Step::Return) => {
                // SAFETY: `top` is live.
                unsafe { (*top.as_ptr()).state = FrameState::Exhausted };
            }
            Err(fault) => {
                // SAFETY: `top` is live.
                if unsafe { descriptor::descriptor(top) }.is_bottom() {
                    // SAFETY: `top` is live.
                    unsafe { (*top.as_ptr()).state = FrameState::Faulted };
                    return Err(fault);
                }
                // SAFETY: `top` is live and no reference into it is held.
                unsafe { store_fault(top, fault) };
            }
        }

        // SAFETY: `top` is the chain's active frame and has completed.
        match unsafe { descriptor::pop(top, stats) } {
            None => return Ok(Resumed::Finished),
            Some(parent) => {
                // SAFETY: `parent` is live and owns the completed frame.
                let child = unsafe { (*parent.as_ptr()).child.take() };
                if let Some(mut child) = child {
                    pending = child.exception.take();
                }
            }
        }
    }
}

/// # Safety
///
/// `frame` must be the live top of the chain rooted at `bottom`.
unsafe fn suspend_with_value<T>(frame: FramePtr<T>, bottom: FramePtr<T>, value: T) {
    // SAFETY: guaranteed by the caller; the slot address is derived without a reference.
    unsafe {
        let slot = &raw mut (*frame.as_ptr()).current;
        *slot = Some(value);
        (*frame.as_ptr()).state = FrameState::Suspended;
        descriptor::set_value(bottom, Some(NonNull::new_unchecked(slot)));
    }
}

/// # Safety
///
/// `frame` must point to a live nested frame.
unsafe fn store_fault<T>(frame: FramePtr<T>, fault: SeqError) {
    // SAFETY: guaranteed by the caller.
    let frame = unsafe { &mut *frame.as_ptr() };
    if frame.exception.is_some() {
        violation(ProtocolViolation::FaultAlreadyStored);
    }
    tracing::debug!(
        depth = frame.descriptor.depth(),
        fault = %fault,
        "fault stored in nested frame"
    );
    frame.exception = Some(fault);
    frame.state = FrameState::Faulted;
}
