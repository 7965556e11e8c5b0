//! # Rill Seq
//!
//! Lazy sequences with nested delegation.
//!
//! A [`Sequence`] produces values on demand from a resumable [`Body`]. A body
//! may hand the rest of its output over to another sequence for a while by
//! returning [`Step::Delegate`]; elements produced at any nesting depth reach
//! the consumer directly, and resuming a chain costs the same whether it is
//! one frame deep or ten thousand.
//!
//! ```
//! use rill_seq::{SeqResult, Sequence, Step, elements_of_iter};
//!
//! fn main() -> SeqResult<()> {
//!     let mut stage = 0;
//!     let seq = Sequence::from_fn(move || {
//!         stage += 1;
//!         Ok(match stage {
//!             1 => Step::Yield(1),
//!             2 => Step::Delegate(elements_of_iter(2..4)),
//!             3 => Step::Yield(5),
//!             _ => Step::Return,
//!         })
//!     });
//!     let values: Vec<i32> = seq.into_iter().collect::<SeqResult<_>>()?;
//!     assert_eq!(values, [1, 2, 3, 5]);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`body`]: the `Body` trait and ready-made bodies
//! - `frame`: frame layout and the resume state machine
//! - `descriptor`: bottom/parent links giving O(1) resume at any depth
//! - [`sequence`] / [`cursor`]: the handle and the begun iteration
//! - [`delegate`]: `elements_of` targets
//!
//! Frames are placed by `rill_alloc`; pass an allocator token to
//! [`Sequence::new_in`] to control where.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod body;
pub mod config;
pub mod cursor;
pub mod delegate;
mod descriptor;
pub mod error;
mod frame;
pub mod sequence;
pub mod state;
pub mod stats;

pub use body::{Body, FromFn, IterBody, Step, from_fn};
pub use config::{ChainConfig, DEFAULT_MAX_DEPTH, MIN_MAX_DEPTH};
pub use cursor::Cursor;
pub use delegate::{ElementsOf, elements_of, elements_of_iter, elements_of_iter_in};
pub use error::{ProtocolViolation, SeqError, SeqResult};
pub use sequence::{IntoIter, Sequence};
pub use state::{FrameState, HandleState};
pub use stats::ChainStats;

pub use rill_alloc::{
    AllocError, AllocToken, FrameAllocator, FrameHeader, Global, Heap, Placement, Stateful,
    Stateless, StatelessAllocator, Tracking,
};
