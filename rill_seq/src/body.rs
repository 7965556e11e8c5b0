//! The computation behind a sequence.
//!
//! A body is an explicit state machine: its own fields are the captured
//! locals and its own discriminant is the resume point. Each call to
//! [`Body::resume`] runs from the saved resume point to the next suspension
//! and reports what happened as a [`Step`].
//!
//! ```ignore
//! enum Countdown { At(u32), Done }
//!
//! impl Body<u32> for Countdown {
//!     fn resume(&mut self) -> SeqResult<Step<u32>> {
//!         match *self {
//!             Countdown::At(0) => { *self = Countdown::Done; Ok(Step::Return) }
//!             Countdown::At(n) => { *self = Countdown::At(n - 1); Ok(Step::Yield(n)) }
//!             Countdown::Done => Ok(Step::Return),
//!         }
//!     }
//! }
//! ```

use std::fmt;

use crate::delegate::ElementsOf;
use crate::error::{SeqError, SeqResult};
use crate::sequence::Sequence;

// =============================================================================
// Step
// =============================================================================

/// How a resume ended.
pub enum Step<T> {
    /// Suspend, producing a value.
    Yield(T),
    /// Suspend, producing every element of another sequence first.
    Delegate(ElementsOf<T>),
    /// Complete normally.
    Return,
}

impl<T> Step<T> {
    /// Delegates to `sequence`.
    #[inline]
    pub fn delegate(sequence: Sequence<T>) -> Self {
        Self::Delegate(ElementsOf::from(sequence))
    }

    /// Returns true for [`Step::Yield`].
    #[inline]
    pub fn is_yield(&self) -> bool {
        matches!(self, Self::Yield(_))
    }
}

impl<T: fmt::Debug> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yield(v) => f.debug_tuple("Yield").field(v).finish(),
            Self::Delegate(d) => f.debug_tuple("Delegate").field(d).finish(),
            Self::Return => f.write_str("Return"),
        }
    }
}

// =============================================================================
// Body
// =============================================================================

/// A resumable computation producing values of type `T`.
pub trait Body<T> {
    /// Runs until the next yield, delegation, completion, or fault.
    ///
    /// # Errors
    ///
    /// A returned error is a body fault: in the outermost frame it reaches
    /// the caller of `advance`; in a nested frame it is handed to the parent
    /// through [`Body::resume_with_fault`].
    fn resume(&mut self) -> SeqResult<Step<T>>;

    /// Resumes after a delegated sequence faulted.
    ///
    /// Called in place of [`Body::resume`] right after the `elements_of`
    /// step whose sequence raised `fault`. The default rethrows.
    ///
    /// # Errors
    ///
    /// Returning the fault (or another one) propagates it further out.
    fn resume_with_fault(&mut self, fault: SeqError) -> SeqResult<Step<T>> {
        Err(fault)
    }
}

impl<T, B: Body<T> + ?Sized> Body<T> for Box<B> {
    #[inline]
    fn resume(&mut self) -> SeqResult<Step<T>> {
        (**self).resume()
    }

    #[inline]
    fn resume_with_fault(&mut self, fault: SeqError) -> SeqResult<Step<T>> {
        (**self).resume_with_fault(fault)
    }
}

// =============================================================================
// Closure Bodies
// =============================================================================

/// Body driven by a closure; see [`from_fn`].
pub struct FromFn<F>(F);

/// Builds a body from a closure called once per resume.
///
/// The closure's captured state serves as the frame's locals.
#[inline]
pub fn from_fn<T, F>(f: F) -> FromFn<F>
where
    F: FnMut() -> SeqResult<Step<T>>,
{
    FromFn(f)
}

impl<T, F> Body<T> for FromFn<F>
where
    F: FnMut() -> SeqResult<Step<T>>,
{
    #[inline]
    fn resume(&mut self) -> SeqResult<Step<T>> {
        (self.0)()
    }
}

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FromFn")
    }
}

// =============================================================================
// Iterator Adapter
// =============================================================================

/// Body yielding each element of an iterator; synthesized when a plain
/// iterable is delegated to.
#[derive(Debug)]
pub struct IterBody<I> {
    iter: I,
}

impl<I: Iterator> IterBody<I> {
    /// Wraps `iter`.
    #[inline]
    pub fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<I: Iterator> Body<I::Item> for IterBody<I> {
    #[inline]
    fn resume(&mut self) -> SeqResult<Step<I::Item>> {
        Ok(match self.iter.next() {
            Some(value) => Step::Yield(value),
            None => Step::Return,
        })
    }
}
