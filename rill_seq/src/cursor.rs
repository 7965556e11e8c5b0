//! Cursors: the begun side of a sequence.

use std::fmt;
use std::iter::FusedIterator;

use crate::error::{ProtocolViolation, SeqResult, violation};
use crate::sequence::Sequence;
use crate::stats::ChainStats;

/// Position in a begun sequence.
///
/// A fresh cursor sits before the first element: call [`Cursor::advance`],
/// then check [`Cursor::is_done`] before reading [`Cursor::current`].
///
/// ```ignore
/// let mut cursor = seq.begin();
/// cursor.advance()?;
/// while !cursor.is_done() {
///     consume(cursor.current());
///     cursor.advance()?;
/// }
/// ```
pub struct Cursor<'a, T> {
    seq: &'a mut Sequence<T>,
}

impl<'a, T> Cursor<'a, T> {
    pub(crate) fn new(seq: &'a mut Sequence<T>) -> Self {
        Self { seq }
    }

    /// Runs the sequence to its next element.
    ///
    /// # Errors
    ///
    /// The fault raised by a body and not handled inside the chain. The
    /// sequence is finished afterwards.
    ///
    /// # Panics
    ///
    /// If a previous advance panicked part-way and the chain is being
    /// re-entered.
    #[inline]
    pub fn advance(&mut self) -> SeqResult<()> {
        self.seq.step()
    }

    /// True once the sequence has no further elements.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.seq.is_finished()
    }

    /// The element produced by the last advance.
    ///
    /// # Panics
    ///
    /// Before the first advance, once the sequence is done, and after
    /// [`Iterator::next`] moved the element out.
    #[track_caller]
    pub fn current(&self) -> &T {
        match self.try_current() {
            Ok(value) => value,
            Err(v) => violation(v),
        }
    }

    /// Like [`Cursor::current`], reporting misuse instead of panicking.
    ///
    /// # Errors
    ///
    /// [`ProtocolViolation::CurrentAfterEnd`] once done,
    /// [`ProtocolViolation::CurrentBeforeAdvance`] before the first advance,
    /// and [`ProtocolViolation::CurrentTaken`] if [`Iterator::next`] already
    /// moved the element out.
    pub fn try_current(&self) -> Result<&T, ProtocolViolation> {
        if self.is_done() {
            return Err(ProtocolViolation::CurrentAfterEnd);
        }
        if let Some(value) = self.seq.current_ref() {
            return Ok(value);
        }
        if self.seq.stats().advances == 0 {
            Err(ProtocolViolation::CurrentBeforeAdvance)
        } else {
            Err(ProtocolViolation::CurrentTaken)
        }
    }

    /// Resume counters for the chain.
    #[inline]
    pub fn stats(&self) -> ChainStats {
        self.seq.stats()
    }

    /// Nesting depth of the frame that produced the current element.
    #[inline]
    pub fn depth(&self) -> usize {
        self.seq.stats().depth
    }
}

impl<T> Iterator for Cursor<'_, T> {
    type Item = SeqResult<T>;

    /// Advances and moves the element out of the sequence.
    fn next(&mut self) -> Option<Self::Item> {
        self.seq.pull()
    }
}

impl<T> FusedIterator for Cursor<'_, T> {}

impl<T> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("done", &self.is_done())
            .field("depth", &self.depth())
            .finish()
    }
}
