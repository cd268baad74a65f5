//! The event loop and its building blocks.
//!
//! This module contains the [`Scheduler`] together with the pieces it is
//! made of:
//! - the clock (monotonic or virtual),
//! - the microtask queue that delivers settlement observers,
//! - the set of futures spawned onto the loop and their wakers.
//!
//! Timers live in [`crate::time`]; tasks in [`task`].

mod local;
mod waker;

pub(crate) mod builder;
pub(crate) mod clock;
pub(crate) mod core;

pub mod task;
