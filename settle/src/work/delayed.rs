use super::source::{Completion, WorkSource};
use crate::runtime::core::Scheduler;
use crate::signal::{CancelSignal, ListenerId};

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

/// Simulated I/O: settles with a fixed result after a delay.
///
/// Stands in for a network request or any other operation with latency.
/// When started with a signal, aborting it cancels the pending timer, so an
/// aborted request stops instead of merely being ignored.
///
/// # Examples
///
/// ```rust,ignore
/// let signal = CancelSignal::new(&scheduler);
/// let mirror = scheduler.start(
///     Delayed::<_, String>::succeed(Duration::from_millis(184), "html").label("mirror-a"),
///     Some(&signal),
/// );
/// ```
#[derive(Debug)]
pub struct Delayed<T, E> {
    after: Duration,
    outcome: Result<T, E>,
    label: String,
}

impl<T, E> Delayed<T, E> {
    pub fn new(after: Duration, outcome: Result<T, E>) -> Self {
        Self {
            after,
            outcome,
            label: String::from("delayed"),
        }
    }

    /// Work that fulfills with `value` after `after`.
    pub fn succeed(after: Duration, value: T) -> Self {
        Self::new(after, Ok(value))
    }

    /// Work that rejects with `reason` after `after`.
    pub fn fail(after: Duration, reason: E) -> Self {
        Self::new(after, Err(reason))
    }

    /// Name used in log records.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl<T: 'static, E: 'static> WorkSource<T, E> for Delayed<T, E> {
    fn start(
        self: Box<Self>,
        scheduler: &Scheduler,
        done: Completion<T, E>,
        signal: Option<CancelSignal>,
    ) {
        let Delayed {
            after,
            outcome,
            label,
        } = *self;

        let started = scheduler.now();
        let owner = scheduler.downgrade();
        let responder = label.clone();

        // Filled in once the abort listener exists; withdrawn after responding.
        let registration: Rc<Cell<Option<ListenerId>>> = Rc::default();
        let watched = signal.as_ref().map(CancelSignal::downgrade);
        let listener = Rc::clone(&registration);

        let timer = scheduler.schedule(after, move || {
            let elapsed = owner.upgrade().map(|s| s.now().saturating_sub(started));
            debug!(label = %responder, ?elapsed, "delayed work responded");
            done.complete(outcome);

            if let Some(signal) = watched.and_then(|weak| weak.upgrade())
                && let Some(id) = listener.take()
            {
                signal.remove_listener(id);
            }
        });

        if let Some(signal) = signal {
            let owner = scheduler.downgrade();

            let id = signal.on_abort(move || {
                if let Some(scheduler) = owner.upgrade()
                    && scheduler.cancel_timer(&timer)
                {
                    debug!(label = %label, "delayed work aborted");
                }
            });
            registration.set(Some(id));
        }
    }
}
