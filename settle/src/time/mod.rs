//! Timers.
//!
//! This module provides the timer queue that backs
//! [`Scheduler::schedule`](crate::Scheduler::schedule) and friends, along
//! with task-producing helpers built on it:
//! - [`delay`] for a task that fulfills with a value after a delay,
//! - [`sleep`] for a task that fulfills with `()` after a delay.

pub(crate) mod queue;

mod sleep;

pub use queue::{TimerHandle, TimerId};

#[doc(inline)]
pub use sleep::{delay, sleep};
