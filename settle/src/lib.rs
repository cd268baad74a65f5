//! # Settle
//!
//! **Settle** is a small, single-threaded task orchestration engine. It
//! models deferred work as [`Task`]s that settle exactly once, runs their
//! callbacks on a cooperative event loop, and composes them with the usual
//! combinators.
//!
//! Everything runs on one thread, driven by a [`Scheduler`]:
//!
//! - a **microtask queue** for settlement observers, drained to exhaustion
//!   before any timer fires
//! - a **timer queue** for one-shot and interval timers, ordered by
//!   deadline and then by scheduling order
//! - **combinators** ([`all`], [`race`], [`any`], [`all_settled`]) and
//!   dependent [`Pipeline`]s
//! - **cooperative cancellation** through [`CancelSignal`]
//! - **async/await** on top of tasks, with `#[settle::main]` and
//!   `#[settle::test]`
//!
//! A scheduler can run on a virtual clock that jumps straight to the next
//! deadline, which makes timing-dependent code deterministic in tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use settle::{Scheduler, all, time::delay};
//! use std::time::Duration;
//!
//! #[settle::main(virtual_time)]
//! async fn main(scheduler: Scheduler) {
//!     let user = delay::<_, String>(&scheduler, Duration::from_millis(200), "ada");
//!     let posts = delay::<_, String>(&scheduler, Duration::from_millis(50), "posts");
//!
//!     let both = all(&scheduler, [user, posts]).await;
//!     assert_eq!(both, Ok(vec!["ada", "posts"]));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`task`]: Tasks, their outcomes and observers
//! - [`combinator`]: ALL, RACE, ANY, ALL-SETTLED and pipelines
//! - [`signal`]: Cooperative cancellation
//! - [`time`]: Timers, delays and sleeping
//! - [`work`]: The boundary to external work

mod runtime;
mod utils;

pub mod combinator;
pub mod error;
pub mod signal;
pub mod time;
pub mod work;

pub use runtime::builder::SchedulerBuilder;
pub use runtime::clock::ClockKind;
pub use runtime::core::Scheduler;
pub use runtime::task;

pub use combinator::{Pipeline, all, all_settled, any, race};
pub use error::{AggregateError, RunError, TaskError};
pub use signal::{CancelSignal, ListenerId};
pub use task::{Settled, Status, Subscription, Task, TaskFuture, TaskId};
pub use time::{TimerHandle, TimerId};
pub use work::{Completion, Delayed, WorkSource};

pub use settle_macros::{main, test};
