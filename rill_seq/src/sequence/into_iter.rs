//! Rust iteration over sequences.

use std::fmt;
use std::iter::FusedIterator;

use super::Sequence;
use crate::cursor::Cursor;
use crate::error::{ProtocolViolation, SeqResult, violation};
use crate::stats::ChainStats;

// =============================================================================
// Rust Iteration
// =============================================================================

/// Owning iterator over a sequence's values.
///
/// Yields `Err` once if the sequence faults, then `None`.
pub struct IntoIter<T> {
    seq: Sequence<T>,
}

impl<T> IntoIter<T> {
    /// Resume counters for the underlying chain.
    pub fn stats(&self) -> ChainStats {
        self.seq.stats()
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = SeqResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.seq.pull()
    }
}

impl<T> FusedIterator for IntoIter<T> {}

impl<T> fmt::Debug for IntoIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter").field(&self.seq).finish()
    }
}

impl<T> IntoIterator for Sequence<T> {
    type Item = SeqResult<T>;
    type IntoIter = IntoIter<T>;

    /// # Panics
    ///
    /// If the handle was already begun.
    #[track_caller]
    fn into_iter(mut self) -> IntoIter<T> {
        if self.activate().is_err() {
            violation(ProtocolViolation::AlreadyBegun);
        }
        IntoIter { seq: self }
    }
}

impl<'a, T> IntoIterator for &'a mut Sequence<T> {
    type Item = SeqResult<T>;
    type IntoIter = Cursor<'a, T>;

    #[track_caller]
    fn into_iter(self) -> Cursor<'a, T> {
        self.begin()
    }
}
