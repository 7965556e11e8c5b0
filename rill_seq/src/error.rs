//! Error types and result definitions for sequences.
//!
//! Three families of failure reach the code driving a sequence:
//! - Resource exhaustion (a frame could not be allocated)
//! - Protocol violations (caller misuse; the panicking entry points abort on these)
//! - Body faults (raised by the computation producing the values)

use std::error::Error as StdError;
use std::fmt;

use rill_alloc::AllocError;
use thiserror::Error;

/// The result type used throughout rill.
pub type SeqResult<T> = Result<T, SeqError>;

/// Everything that can go wrong while building or driving a sequence.
#[derive(Error, Debug)]
pub enum SeqError {
    /// A frame allocation failed.
    #[error(transparent)]
    ResourceExhausted(#[from] AllocError),

    /// The handle or cursor was used out of protocol.
    #[error("protocol violation: {0}")]
    Protocol(ProtocolViolation),

    /// Delegation nested deeper than the chain allows.
    #[error("RecursionError: delegation depth limit of {limit} exceeded")]
    DepthExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// A body raised a fault described by a message.
    #[error("{message}")]
    Raised {
        /// Fault description.
        message: String,
    },

    /// A body raised a fault carrying an arbitrary error.
    #[error("{0}")]
    Body(Box<dyn StdError + 'static>),
}

impl SeqError {
    /// Creates a message fault.
    pub fn raised<S: Into<String>>(message: S) -> Self {
        Self::Raised {
            message: message.into(),
        }
    }

    /// Wraps an arbitrary error raised by a body.
    pub fn body<E: StdError + 'static>(error: E) -> Self {
        Self::Body(Box::new(error))
    }

    /// Returns true if an allocator refused a frame.
    #[inline]
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_))
    }

    /// Returns true if this reports caller misuse.
    #[inline]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns true if the fault came from a body.
    #[inline]
    pub fn is_body_fault(&self) -> bool {
        matches!(self, Self::Raised { .. } | Self::Body(_))
    }

    /// The violation, if this is a protocol error.
    #[inline]
    pub fn violation(&self) -> Option<ProtocolViolation> {
        match self {
            Self::Protocol(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<ProtocolViolation> for SeqError {
    fn from(violation: ProtocolViolation) -> Self {
        Self::Protocol(violation)
    }
}

// =============================================================================
// Protocol Violations
// =============================================================================

/// Ways of driving a sequence out of protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolViolation {
    /// `begin` on a handle that was already begun.
    AlreadyBegun,
    /// A frame was resumed while it was still running.
    Reentered,
    /// `current` before the first `advance`.
    CurrentBeforeAdvance,
    /// `current` after the sequence finished.
    CurrentAfterEnd,
    /// `current` after iteration moved the element out.
    CurrentTaken,
    /// `elements_of` on a handle that was already begun.
    DelegatedBegun,
    /// A second fault was stored while one was in flight.
    FaultAlreadyStored,
}

impl ProtocolViolation {
    /// Human-readable description.
    pub const fn message(self) -> &'static str {
        match self {
            Self::AlreadyBegun => "sequence already begun; a handle can only be iterated once",
            Self::Reentered => "sequence already executing",
            Self::CurrentBeforeAdvance => "no current value before the first advance",
            Self::CurrentAfterEnd => "no current value after the sequence finished",
            Self::CurrentTaken => "current value was already moved out by the iterator",
            Self::DelegatedBegun => "cannot delegate to a sequence that was already begun",
            Self::FaultAlreadyStored => "a fault is already in flight for this frame",
        }
    }
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Aborts the computation on caller misuse.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn violation(v: ProtocolViolation) -> ! {
    panic!("protocol violation: {v}")
}
