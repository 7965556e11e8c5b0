//! Frame and handle lifecycle states.
//!
//! # Frame States
//!
//! ```text
//!            resume            yield / delegate
//! Created ─────────► Running ──────────────────► Suspended
//!                     │  ▲                           │
//!                     │  └───────── resume ──────────┘
//!                     ├── return ──► Exhausted
//!                     └── fault ───► Faulted
//! ```
//!
//! `Running` doubles as the reentry guard: a frame found `Running` when it
//! is about to be resumed means a previous resume never came back.

use std::fmt;

// ============================================================================
// Frame State
// ============================================================================

/// Execution state of one frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameState {
    /// Created but never resumed.
    #[default]
    Created = 0,
    /// Currently executing its body.
    Running = 1,
    /// Suspended at a yield or a delegation.
    Suspended = 2,
    /// Completed normally.
    Exhausted = 3,
    /// Completed by raising a fault.
    Faulted = 4,
}

impl FrameState {
    /// Returns true if the frame can be resumed.
    #[inline(always)]
    pub const fn is_resumable(self) -> bool {
        matches!(self, Self::Created | Self::Suspended)
    }

    /// Returns true if the frame will never run again.
    #[inline(always)]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Exhausted | Self::Faulted)
    }

    /// Short name for diagnostics.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Created => "FRAME_CREATED",
            Self::Running => "FRAME_RUNNING",
            Self::Suspended => "FRAME_SUSPENDED",
            Self::Exhausted => "FRAME_EXHAUSTED",
            Self::Faulted => "FRAME_FAULTED",
        }
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Handle State
// ============================================================================

/// Lifecycle of a [`crate::Sequence`] handle, checked on every public call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandleState {
    /// Not begun yet; may be begun or delegated once.
    #[default]
    Idle,
    /// Begun and being iterated.
    Active,
    /// Finished, faulted, or handed over to another chain.
    Consumed,
}

impl HandleState {
    /// Returns true if the handle may still be begun or delegated.
    #[inline]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Consumed => "consumed",
        })
    }
}
