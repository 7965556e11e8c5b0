//! Delegation targets: `elements_of`.
//!
//! A body delegates by returning [`Step::Delegate`](crate::Step::Delegate)
//! with an [`ElementsOf`]. The delegating frame suspends, the target's frame
//! is pushed onto its chain, and every element the target produces reaches
//! the outermost consumer directly.

use std::fmt;

use rill_alloc::{AllocToken, Global, Placement};

use crate::body::IterBody;
use crate::error::{SeqError, SeqResult};
use crate::frame::{self, OwnedFrame};
use crate::sequence::Sequence;

/// Something a frame can delegate to.
pub struct ElementsOf<T> {
    source: Source<T>,
}

enum Source<T> {
    /// A not-yet-begun sequence; its frame moves into the delegating chain.
    Sequence(Sequence<T>),
    /// The adapter frame for an iterable could not be allocated. Surfaces
    /// as a fault at the delegation point.
    Failed(SeqError),
}

/// Delegates to `sequence`.
///
/// The sequence must not have been begun; delegating to a begun sequence is
/// a protocol violation reported when the delegation runs.
#[inline]
pub fn elements_of<T>(sequence: Sequence<T>) -> ElementsOf<T> {
    ElementsOf {
        source: Source::Sequence(sequence),
    }
}

/// Delegates to a plain iterable, allocating its adapter frame with the
/// process allocator.
pub fn elements_of_iter<I>(iterable: I) -> ElementsOf<I::Item>
where
    I: IntoIterator,
    I::IntoIter: 'static,
{
    elements_of_iter_in(Global, iterable)
}

/// Delegates to a plain iterable, allocating its adapter frame as `token`
/// directs.
///
/// If the allocator refuses, the delegating body is resumed with
/// [`SeqError::ResourceExhausted`] at the delegation point.
pub fn elements_of_iter_in<K, I>(token: K, iterable: I) -> ElementsOf<I::Item>
where
    K: AllocToken,
    I: IntoIterator,
    I::IntoIter: 'static,
{
    let placement = token.placement();
    let source = match frame::place_in(token, IterBody::new(iterable.into_iter())) {
        Ok(frame) => Source::Sequence(Sequence::from_frame(frame)),
        Err(err) => {
            tracing::debug!(%placement, error = %err, "adapter frame allocation failed");
            Source::Failed(err.into())
        }
    };
    ElementsOf { source }
}

impl<T> ElementsOf<T> {
    /// How the target's frame was placed, if it has one.
    pub fn placement(&self) -> Option<Placement> {
        match &self.source {
            Source::Sequence(seq) => seq.frame_header().map(|h| h.placement()),
            Source::Failed(_) => None,
        }
    }

    /// Takes the target frame out for pushing.
    ///
    /// `Ok(None)` means there is nothing to delegate to.
    pub(crate) fn into_frame(self) -> SeqResult<Option<OwnedFrame<T>>> {
        match self.source {
            Source::Sequence(seq) => Ok(seq.into_delegate()),
            Source::Failed(err) => Err(err),
        }
    }
}

impl<T> From<Sequence<T>> for ElementsOf<T> {
    #[inline]
    fn from(sequence: Sequence<T>) -> Self {
        elements_of(sequence)
    }
}

impl<T> fmt::Debug for ElementsOf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Source::Sequence(seq) => f.debug_tuple("ElementsOf").field(seq).finish(),
            Source::Failed(err) => f
                .debug_struct("ElementsOf")
                .field("failed", &err.to_string())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_alloc::{Stateful, Tracking};

    #[test]
    fn test_iter_adapter_uses_global_placement() {
        let target = elements_of_iter(vec![1, 2, 3]);
        assert_eq!(target.placement(), Some(Placement::Global));
        assert!(target.into_frame().unwrap().is_some());
    }

    #[test]
    fn test_iter_adapter_failure_is_deferred() {
        let target = elements_of_iter_in(Stateful(Tracking::with_budget(0)), 0..4);
        assert_eq!(target.placement(), None);
        let err = target.into_frame().err().unwrap();
        assert!(err.is_resource_exhausted());
    }

    #[test]
    fn test_empty_sequence_has_no_frame() {
        let target = elements_of(Sequence::<u8>::empty());
        assert!(target.into_frame().unwrap().is_none());
    }

    #[test]
    fn test_debug_names_target() {
        let target = elements_of(Sequence::from_iterable([1u8]));
        assert!(format!("{target:?}").starts_with("ElementsOf"));
    }
}
