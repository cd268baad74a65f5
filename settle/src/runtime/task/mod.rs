//! Tasks: units of deferred work with a one-way settlement lifecycle.
//!
//! A [`Task`] is created pending and settles exactly once, as fulfilled,
//! rejected or cancelled. Observers registered with [`Task::on_settle`] are
//! delivered through the scheduler's microtask queue, in subscription order.
//!
//! Tasks can be chained into pipelines (`map`, `and_then`, `or_else`,
//! `finally`) and awaited from futures spawned on the scheduler.

pub(crate) mod handle;
pub(crate) mod state;

pub(crate) mod core;

pub(crate) use self::core::WeakTask;

pub use self::core::{Subscription, Task, TaskId};
pub use handle::TaskFuture;
pub use state::{Settled, Status};
