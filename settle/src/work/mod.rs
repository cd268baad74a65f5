//! The boundary to external work.
//!
//! The engine treats I/O as a [`WorkSource`]: something started with a
//! [`Completion`] and an optional [`CancelSignal`](crate::CancelSignal),
//! which eventually reports success or failure. [`Scheduler::start`]
//! turns a source into a [`Task`](crate::Task).
//!
//! [`Delayed`] is a simulated source with fixed latency, useful for demos
//! and tests.
//!
//! [`Scheduler::start`]: crate::Scheduler::start

mod delayed;
mod source;

pub use delayed::Delayed;
pub use source::{Completion, WorkSource};
