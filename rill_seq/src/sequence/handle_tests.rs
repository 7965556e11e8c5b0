//! Tests for the sequence handle and its teardown.

use super::*;

use std::cell::RefCell;
use std::rc::Rc;

use rill_alloc::{Placement, Stateful, Tracking};

use crate::error::SeqError;

type Log = Rc<RefCell<Vec<usize>>>;

/// Level `level` of a chain `depth` deep. Every level but the deepest
/// delegates to the next one, then yields its own level; the deepest yields
/// its level twice. Records its level in `log` when dropped.
struct Level {
    level: usize,
    depth: usize,
    stage: u8,
    log: Log,
}

impl Level {
    fn sequence(level: usize, depth: usize, log: &Log) -> Sequence<usize> {
        Sequence::new(Self {
            level,
            depth,
            stage: 0,
            log: Rc::clone(log),
        })
    }
}

impl Body<usize> for Level {
    fn resume(&mut self) -> SeqResult<Step<usize>> {
        self.stage += 1;
        Ok(match (self.level == self.depth, self.stage) {
            (true, 1 | 2) | (false, 2) => Step::Yield(self.level),
            (false, 1) => Step::delegate(Self::sequence(self.level + 1, self.depth, &self.log)),
            _ => Step::Return,
        })
    }
}

impl Drop for Level {
    fn drop(&mut self) {
        self.log.borrow_mut().push(self.level);
    }
}

fn deep() -> Sequence<u32> {
    Sequence::from_fn(|| Ok(Step::delegate(deep())))
}

// =============================================================================
// Handle Protocol
// =============================================================================

#[test]
fn test_new_handle_is_idle() {
    let seq = Sequence::from_iterable([1, 2]);
    assert_eq!(seq.state(), HandleState::Idle);
    assert_eq!(seq.frame_state(), Some(FrameState::Created));
    assert_eq!(
        seq.frame_header().map(|h| h.placement()),
        Some(Placement::Global)
    );
}

#[test]
fn test_state_transitions() {
    let mut seq = Sequence::from_iterable([7]);
    {
        let mut cursor = seq.begin();
        cursor.advance().unwrap();
        assert_eq!(*cursor.current(), 7);
        cursor.advance().unwrap();
        assert!(cursor.is_done());
    }
    assert_eq!(seq.state(), HandleState::Consumed);
    assert_eq!(seq.frame_state(), Some(FrameState::Exhausted));
}

#[test]
#[should_panic(expected = "sequence already begun")]
fn test_begin_twice_panics() {
    let mut seq = Sequence::from_iterable([1]);
    let _ = seq.begin();
    let _ = seq.begin();
}

#[test]
fn test_try_begin_reports_violation() {
    let mut seq = Sequence::from_iterable([1]);
    assert!(seq.try_begin().is_ok());
    let err = seq.try_begin().err().unwrap();
    assert_eq!(err.violation(), Some(ProtocolViolation::AlreadyBegun));
}

#[test]
fn test_empty_handle_is_done_immediately() {
    let mut seq = Sequence::<u8>::empty();
    let mut cursor = seq.begin();
    assert!(cursor.is_done());
    cursor.advance().unwrap();
    assert!(cursor.is_done());
    assert_eq!(cursor.next().map(Result::ok), None);
}

#[test]
fn test_take_leaves_inert_handle() {
    let mut seq = Sequence::from_iterable([1, 2]);
    let moved = seq.take();
    assert_eq!(seq.frame_state(), None);
    assert_eq!(moved.frame_state(), Some(FrameState::Created));
    assert_eq!(moved.into_iter().count(), 2);
}

#[test]
#[should_panic(expected = "already begun")]
fn test_into_iter_after_begin_panics() {
    let mut seq = Sequence::from_iterable([1]);
    let _ = seq.begin();
    let _ = seq.into_iter();
}

// =============================================================================
// Cursor
// =============================================================================

#[test]
#[should_panic(expected = "before the first advance")]
fn test_current_before_advance_panics() {
    let mut seq = Sequence::from_iterable([1]);
    let cursor = seq.begin();
    let _ = cursor.current();
}

#[test]
fn test_current_after_end_is_reported() {
    let mut seq = Sequence::from_iterable([1]);
    let mut cursor = seq.begin();
    cursor.advance().unwrap();
    cursor.advance().unwrap();
    assert_eq!(
        cursor.try_current().err(),
        Some(ProtocolViolation::CurrentAfterEnd)
    );
}

#[test]
fn test_current_after_next_reports_taken_value() {
    let mut seq = Sequence::from_iterable([10, 20]);
    let mut cursor = seq.begin();
    assert_eq!(cursor.next().map(Result::unwrap), Some(10));
    assert!(!cursor.is_done());
    assert_eq!(
        cursor.try_current().err(),
        Some(ProtocolViolation::CurrentTaken)
    );

    cursor.advance().unwrap();
    assert_eq!(*cursor.current(), 20);
}

#[test]
#[should_panic(expected = "already moved out by the iterator")]
fn test_current_after_next_panics() {
    let mut seq = Sequence::from_iterable([10, 20]);
    let mut cursor = seq.begin();
    let _ = cursor.next();
    let _ = cursor.current();
}

#[test]
fn test_cursor_iterates_values() {
    let mut seq = Sequence::from_iterable(vec!['a', 'b']);
    let values: Vec<char> = (&mut seq).into_iter().map(Result::unwrap).collect();
    assert_eq!(values, ['a', 'b']);
}

// =============================================================================
// Teardown
// =============================================================================

#[test]
fn test_drop_mid_chain_releases_innermost_first() {
    let log = Log::default();
    let mut seq = Level::sequence(0, 3, &log);
    {
        let mut cursor = seq.begin();
        cursor.advance().unwrap();
        assert_eq!(*cursor.current(), 3);
        assert_eq!(cursor.depth(), 3);
    }
    assert!(log.borrow().is_empty());
    drop(seq);
    assert_eq!(*log.borrow(), [3, 2, 1, 0]);
}

#[test]
fn test_full_run_order_and_release() {
    let log = Log::default();
    let seq = Level::sequence(0, 3, &log);
    let mut iter = seq.into_iter();
    let values: Vec<usize> = iter.by_ref().map(Result::unwrap).collect();
    assert_eq!(values, [3, 3, 2, 1, 0]);
    assert_eq!(*log.borrow(), [3, 2, 1]);
    assert_eq!(iter.stats().pushes, 3);
    assert_eq!(iter.stats().pops, 3);
    drop(iter);
    assert_eq!(*log.borrow(), [3, 2, 1, 0]);
}

#[test]
fn test_abandoned_chain_returns_every_block() {
    let tracking = Tracking::new();
    let stats = tracking.shared_stats();

    fn chain(tracking: &Tracking, level: u32) -> SeqResult<Sequence<u32>> {
        let inner = tracking.clone();
        let mut delegated = false;
        let body = body::from_fn(move || {
            if level == 4 {
                return Ok(Step::Yield(level));
            }
            if delegated {
                return Ok(Step::Return);
            }
            delegated = true;
            Ok(Step::delegate(chain(&inner, level + 1)?))
        });
        Sequence::new_in(Stateful(tracking.clone()), body)
    }

    let mut seq = chain(&tracking, 0).unwrap();
    {
        let mut cursor = seq.begin();
        cursor.advance().unwrap();
        assert_eq!(*cursor.current(), 4);
    }
    assert_eq!(stats.live_blocks(), 5);
    drop(seq);
    assert!(stats.is_balanced());
    assert_eq!(stats.live_bytes(), 0);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_depth_limit_surfaces_as_fault() {
    let mut seq = deep().with_config(ChainConfig::with_max_depth(8));
    let mut cursor = seq.begin();
    let err = cursor.advance().unwrap_err();
    assert!(matches!(err, SeqError::DepthExceeded { limit: 8 }));
    assert!(cursor.is_done());
    assert_eq!(cursor.stats().max_depth, 8);
}

#[test]
fn test_debug_output() {
    let seq = Sequence::from_iterable([1]);
    let text = format!("{seq:?}");
    assert!(text.contains("Idle"));
    assert!(text.contains("Global"));
}
