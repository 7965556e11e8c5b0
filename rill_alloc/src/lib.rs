//! # Rill Alloc
//!
//! Allocation of suspended sequence frames.
//!
//! A suspended frame is the state a lazy sequence keeps between two resumes.
//! Frames are allocated one block each, and every block is self-describing:
//! a [`FrameHeader`] at the front records the block layout and how to give
//! the memory back, so releasing a frame never needs outside bookkeeping.
//!
//! # Block Layout
//!
//! ```text
//! ┌──────────────┬──────────────────────────┬─────┬──────────────────┐
//! │ FrameHeader  │ frame (F)                │ pad │ allocator (A)    │
//! └──────────────┴──────────────────────────┴─────┴──────────────────┘
//!  ^ base                                          ^ tail (stateful only)
//! ```
//!
//! - **Global**: no token, `std::alloc`, no release callback, no tail.
//! - **Stateless**: release callback synthesizes `A::default()`, no tail.
//! - **Stateful**: the allocator instance lives in the tail, aligned to
//!   `align_of::<A>()`; the release callback reads it back out.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocator;
pub mod frame_box;
pub mod token;
pub mod tracking;

pub use allocator::{AllocError, FrameAllocator, Heap, StatelessAllocator};
pub use frame_box::{FrameBox, FrameHeader, PackedFrame, Placement};
pub use token::{AllocToken, Global, Stateful, Stateless};
pub use tracking::{AllocStats, Tracking};
