use crate::runtime::core::Scheduler;
use crate::signal::CancelSignal;
use crate::task::{Settled, Status, Task, TaskId};

use std::fmt;

use tracing::debug;

/// Something that, once started, eventually succeeds or fails, and may be
/// told to stop early.
///
/// Implementations report their result through the [`Completion`] they are
/// handed, at most once (the completion is consumed). When a signal is
/// given they should check it before starting and, where feasible, while
/// running. Closures with the matching signature implement this trait.
pub trait WorkSource<T, E> {
    fn start(
        self: Box<Self>,
        scheduler: &Scheduler,
        done: Completion<T, E>,
        signal: Option<CancelSignal>,
    );
}

impl<T, E, F> WorkSource<T, E> for F
where
    F: FnOnce(&Scheduler, Completion<T, E>, Option<CancelSignal>),
{
    fn start(
        self: Box<Self>,
        scheduler: &Scheduler,
        done: Completion<T, E>,
        signal: Option<CancelSignal>,
    ) {
        (*self)(scheduler, done, signal)
    }
}

/// One-shot reporter for the result of a [`WorkSource`].
///
/// Completing after the task was cancelled is ignored. Dropping a
/// `Completion` without completing leaves the task pending.
pub struct Completion<T, E> {
    task: Task<T, E>,
}

impl<T: 'static, E: 'static> Completion<T, E> {
    pub(crate) fn new(task: Task<T, E>) -> Self {
        Self { task }
    }

    /// Reports the result. Returns `false` if the task had already settled
    /// (typically because it was cancelled).
    pub fn complete(self, result: Result<T, E>) -> bool {
        let accepted = self.task.settle(Settled::from(result));

        if !accepted {
            debug!(task = %self.task.id(), "late completion ignored");
        }

        accepted
    }

    pub fn fulfill(self, value: T) -> bool {
        self.complete(Ok(value))
    }

    pub fn reject(self, reason: E) -> bool {
        self.complete(Err(reason))
    }

    /// `true` once the task was cancelled; long-running work should stop.
    pub fn is_cancelled(&self) -> bool {
        self.task.status() == Some(Status::Cancelled)
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }
}

impl<T, E> fmt::Debug for Completion<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").field("task", &self.task).finish()
    }
}

impl Scheduler {
    /// Starts `source` and returns the task it settles.
    ///
    /// With a signal, the task is bound to it: aborting cancels the task.
    /// If the signal has already aborted, the source is never started and
    /// the returned task is already cancelled.
    pub fn start<T, E, W>(&self, source: W, signal: Option<&CancelSignal>) -> Task<T, E>
    where
        T: 'static,
        E: 'static,
        W: WorkSource<T, E> + 'static,
    {
        let task = Task::new(self);

        if let Some(signal) = signal {
            if signal.is_aborted() {
                debug!(task = %task.id(), "signal already aborted, work not started");
                task.cancel();
                return task;
            }

            task.cancel_on(signal);
        }

        Box::new(source).start(self, Completion::new(task.clone()), signal.cloned());
        task
    }
}
