//! The sequence handle.
//!
//! A [`Sequence`] exclusively owns the outermost frame of a lazy
//! computation. It is created idle, begun at most once, and tears down the
//! whole suspended chain when dropped.

use std::fmt;
use std::mem;

use rill_alloc::{AllocToken, FrameBox, FrameHeader};

use crate::body::{self, Body, IterBody, Step};
use crate::config::ChainConfig;
use crate::cursor::Cursor;
use crate::descriptor;
use crate::error::{ProtocolViolation, SeqResult, violation};
use crate::frame::{self, FramePtr, OwnedFrame, Resumed};
use crate::state::{FrameState, HandleState};
use crate::stats::ChainStats;

mod into_iter;

pub use into_iter::IntoIter;

/// Owning handle to a lazy sequence of `T`.
///
/// Move-only. A handle without a frame (see [`Sequence::empty`]) is inert:
/// it begins like any other and produces nothing.
pub struct Sequence<T> {
    frame: Option<OwnedFrame<T>>,
    state: HandleState,
    config: ChainConfig,
    stats: ChainStats,
}

// =============================================================================
// Construction
// =============================================================================

impl<T> Sequence<T> {
    /// Creates a sequence whose frame lives on the process heap.
    ///
    /// Aborts through [`std::alloc::handle_alloc_error`] if the frame cannot
    /// be allocated, like `Box::new`.
    pub fn new<B>(body: B) -> Self
    where
        B: Body<T> + 'static,
    {
        Self::from_frame(frame::place_global(body))
    }

    /// Creates a sequence whose frame is placed as `token` directs.
    ///
    /// # Errors
    ///
    /// [`SeqError::ResourceExhausted`](crate::SeqError::ResourceExhausted)
    /// if the allocator refuses the frame.
    pub fn new_in<K, B>(token: K, body: B) -> SeqResult<Self>
    where
        K: AllocToken,
        B: Body<T> + 'static,
    {
        Ok(Self::from_frame(frame::place_in(token, body)?))
    }

    /// Creates a sequence driven by a closure; see [`crate::from_fn`].
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnMut() -> SeqResult<Step<T>> + 'static,
    {
        Self::new(body::from_fn(f))
    }

    /// Creates a sequence yielding each element of `iterable`.
    pub fn from_iterable<I>(iterable: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Self::new(IterBody::new(iterable.into_iter()))
    }

    /// Like [`Sequence::from_iterable`], placing the adapter frame as `token`
    /// directs.
    ///
    /// # Errors
    ///
    /// [`SeqError::ResourceExhausted`](crate::SeqError::ResourceExhausted)
    /// if the allocator refuses the frame.
    pub fn from_iterable_in<K, I>(token: K, iterable: I) -> SeqResult<Self>
    where
        K: AllocToken,
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        Self::new_in(token, IterBody::new(iterable.into_iter()))
    }

    /// An inert handle with no frame.
    pub fn empty() -> Self {
        Self::with_frame(None)
    }

    pub(crate) fn from_frame(frame: OwnedFrame<T>) -> Self {
        tracing::trace!(
            placement = %FrameBox::header(&frame).placement(),
            size = FrameBox::header(&frame).block_size(),
            "sequence frame allocated"
        );
        Self::with_frame(Some(frame))
    }

    fn with_frame(frame: Option<OwnedFrame<T>>) -> Self {
        Self {
            frame,
            state: HandleState::Idle,
            config: ChainConfig::default(),
            stats: ChainStats::default(),
        }
    }

    /// Replaces the chain limits applied once this handle is begun.
    ///
    /// Ignored if the handle is delegated into another chain; that chain's
    /// configuration governs.
    #[must_use]
    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    /// Moves the sequence out, leaving an inert handle behind.
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

// =============================================================================
// Iteration Protocol
// =============================================================================

impl<T> Sequence<T> {
    /// Begins iteration.
    ///
    /// # Panics
    ///
    /// If the handle was already begun (or delegated away).
    #[track_caller]
    pub fn begin(&mut self) -> Cursor<'_, T> {
        match self.try_begin() {
            Ok(cursor) => cursor,
            Err(_) => violation(ProtocolViolation::AlreadyBegun),
        }
    }

    /// Begins iteration, reporting misuse instead of panicking.
    ///
    /// # Errors
    ///
    /// [`ProtocolViolation::AlreadyBegun`] if the handle is not idle.
    pub fn try_begin(&mut self) -> SeqResult<Cursor<'_, T>> {
        self.activate()?;
        Ok(Cursor::new(self))
    }

    fn activate(&mut self) -> SeqResult<()> {
        if !self.state.is_idle() {
            return Err(ProtocolViolation::AlreadyBegun.into());
        }
        self.state = if self.frame.is_some() {
            HandleState::Active
        } else {
            HandleState::Consumed
        };
        Ok(())
    }

    /// Runs the chain to its next suspension point.
    pub(crate) fn step(&mut self) -> SeqResult<()> {
        let Some(bottom) = self.bottom() else {
            self.state = HandleState::Consumed;
            return Ok(());
        };
        // SAFETY: the handle owns the chain and `&mut self` excludes every
        // other access to it for the duration of the call.
        let result = unsafe { frame::advance_chain(bottom, &self.config, &mut self.stats) };
        match result {
            Ok(Resumed::Yielded) => Ok(()),
            Ok(Resumed::Finished) => {
                self.state = HandleState::Consumed;
                Ok(())
            }
            Err(fault) => {
                self.state = HandleState::Consumed;
                tracing::debug!(fault = %fault, "sequence faulted");
                Err(fault)
            }
        }
    }

    /// Advances and moves the produced value out, `None` once finished.
    pub(crate) fn pull(&mut self) -> Option<SeqResult<T>> {
        if self.is_finished() {
            return None;
        }
        if let Err(fault) = self.step() {
            return Some(Err(fault));
        }
        let bottom = self.bottom()?;
        // SAFETY: the chain is suspended and exclusively borrowed.
        unsafe { frame::take_value(bottom) }.map(Ok)
    }

    /// True once the outermost frame completed or faulted.
    pub(crate) fn is_finished(&self) -> bool {
        self.frame.as_ref().is_none_or(|frame| frame.state.is_finished())
    }

    pub(crate) fn current_ref(&self) -> Option<&T> {
        let bottom = self.bottom()?;
        // SAFETY: the returned reference borrows `self`, which blocks every
        // chain mutation while it lives.
        unsafe { frame::current_value(bottom) }
    }

    pub(crate) fn into_delegate(mut self) -> Option<OwnedFrame<T>> {
        if !self.state.is_idle() {
            violation(ProtocolViolation::DelegatedBegun);
        }
        self.state = HandleState::Consumed;
        self.frame.take()
    }

    fn bottom(&self) -> Option<FramePtr<T>> {
        self.frame.as_ref().map(FrameBox::as_ptr)
    }
}

// =============================================================================
// Introspection
// =============================================================================

impl<T> Sequence<T> {
    /// Lifecycle state of the handle.
    #[inline]
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// State of the outermost frame, if the handle has one.
    #[inline]
    pub fn frame_state(&self) -> Option<FrameState> {
        self.frame.as_ref().map(|frame| frame.state)
    }

    /// Header of the outermost frame's block.
    #[inline]
    pub fn frame_header(&self) -> Option<&FrameHeader> {
        self.frame.as_ref().map(FrameBox::header)
    }

    /// Chain limits used once begun.
    #[inline]
    pub fn config(&self) -> ChainConfig {
        self.config
    }

    /// Resume counters for this handle's chain.
    #[inline]
    pub fn stats(&self) -> ChainStats {
        self.stats
    }
}

// =============================================================================
// Teardown
// =============================================================================

impl<T> Drop for Sequence<T> {
    fn drop(&mut self) {
        let Some(frame) = self.frame.take() else {
            return;
        };
        // SAFETY: no cursor can outlive the handle, so nothing is resuming
        // the chain and no references into it remain.
        let released = unsafe { descriptor::unwind(FrameBox::as_ptr(&frame)) };
        if released > 0 {
            tracing::debug!(released, state = %self.state, "suspended chain torn down");
        }
        drop(frame);
    }
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("state", &self.state)
            .field("frame", &self.frame_state())
            .field("placement", &self.frame_header().map(|h| h.placement()))
            .field("max_depth", &self.config.max_depth)
            .finish()
    }
}

#[cfg(test)]
mod handle_tests;
