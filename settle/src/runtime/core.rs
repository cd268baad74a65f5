use super::builder::{Config, SchedulerBuilder};
use super::clock::{Clock, ClockKind};
use super::local::LocalSet;
use crate::error::RunError;
use crate::task::{Settled, Task};
use crate::time::queue::{TimerCallback, TimerHandle, TimerId, TimerQueue, TimerShared};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::mem;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{Span, debug, info, info_span, trace, warn};

/// A callback queued for the next microtask drain.
pub(crate) type Microtask = Box<dyn FnOnce()>;

/// Smallest interval period; a zero period would never let the loop idle
/// between firings.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

struct Core {
    clock: Clock,

    /// Ready callbacks, run in FIFO order.
    microtasks: RefCell<VecDeque<Microtask>>,

    timers: RefCell<TimerQueue>,

    /// Futures spawned with [`Scheduler::spawn`] or [`Scheduler::block_on`].
    local: LocalSet,

    next_timer_id: Cell<u64>,

    max_ticks: Option<u64>,

    span: Span,

    closed: Cell<bool>,
}

/// The event loop.
///
/// `Scheduler` owns the microtask queue and the timer queue and drives them
/// on the current thread. Each tick:
///
/// 1. drains the microtask queue to exhaustion (settlement observers,
///    deferred signal listeners and polls of woken futures), including any
///    callbacks enqueued while draining;
/// 2. fires every timer that is due, in `(deadline, sequence)` order.
///
/// Callbacks run to completion and are never preempted. `Scheduler` is a
/// cheap handle; clones drive the same loop. It is deliberately `!Send`:
/// every task, timer and signal it serves lives on one thread.
#[derive(Clone)]
pub struct Scheduler {
    core: Rc<Core>,
}

impl Scheduler {
    /// Creates a scheduler with the default configuration (monotonic clock,
    /// no tick limit).
    pub fn new() -> Self {
        SchedulerBuilder::new().build()
    }

    /// Returns a builder to configure a scheduler.
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn from_config(config: Config) -> Self {
        let span = info_span!("scheduler", name = %config.name);

        Self {
            core: Rc::new(Core {
                clock: Clock::new(config.clock),
                microtasks: RefCell::new(VecDeque::new()),
                timers: RefCell::new(TimerQueue::new()),
                local: LocalSet::new(),
                next_timer_id: Cell::new(0),
                max_ticks: config.max_ticks,
                span,
                closed: Cell::new(false),
            }),
        }
    }

    pub fn clock_kind(&self) -> ClockKind {
        self.core.clock.kind()
    }

    /// Time elapsed since the scheduler was created, as seen by its clock.
    pub fn now(&self) -> Duration {
        self.core.clock.now()
    }

    /// Number of timers that can still fire.
    pub fn pending_timers(&self) -> usize {
        self.core.timers.borrow().live()
    }

    /// `true` when nothing is queued and no timer is pending.
    pub fn is_idle(&self) -> bool {
        self.core.microtasks.borrow().is_empty()
            && !self.core.local.has_woken()
            && self.core.timers.borrow().live() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed.get()
    }

    /// Queues `callback` to run during the next microtask drain.
    pub fn queue_microtask<F>(&self, callback: F)
    where
        F: FnOnce() + 'static,
    {
        self.push_microtask(Box::new(callback));
    }

    pub(crate) fn push_microtask(&self, job: Microtask) {
        if self.core.closed.get() {
            warn!("scheduler is shut down, dropping callback");
            return;
        }

        self.core.microtasks.borrow_mut().push_back(job);
    }

    /// Runs `callback` once `delay` has elapsed.
    ///
    /// The deadline is computed once, now. Timers with equal deadlines fire
    /// in the order they were scheduled.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        self.arm(delay, TimerCallback::Once(Some(Box::new(callback))))
    }

    /// Like [`schedule`](Self::schedule) with a millisecond delay.
    /// Negative delays are clamped to zero.
    pub fn schedule_ms<F>(&self, delay_ms: i64, callback: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0));
        self.schedule(delay, callback)
    }

    /// Runs `callback` every `period` until the returned handle is
    /// cancelled. The callback receives its own handle, so it can cancel
    /// itself.
    ///
    /// Each firing re-arms at the previous deadline plus `period`. Periods
    /// below one millisecond are rounded up.
    pub fn schedule_interval<F>(&self, period: Duration, callback: F) -> TimerHandle
    where
        F: FnMut(&TimerHandle) + 'static,
    {
        let period = period.max(MIN_INTERVAL);
        self.arm(
            period,
            TimerCallback::Every {
                period,
                callback: Box::new(callback),
            },
        )
    }

    /// Cancels a timer. Does nothing if it already fired or was cancelled.
    pub fn cancel_timer(&self, handle: &TimerHandle) -> bool {
        let cancelled = self.core.timers.borrow_mut().cancel(&handle.shared);

        if cancelled {
            handle.shared.release();
            trace!(timer = %handle.id(), "timer cancelled");
        }

        cancelled
    }

    fn arm(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = TimerId(self.core.next_timer_id.get());
        self.core.next_timer_id.set(id.0 + 1);

        let shared = TimerShared::new(id, callback);

        if self.core.closed.get() {
            warn!(timer = %id, "scheduler is shut down, timer discarded");
            shared.discard();
            return TimerHandle { shared };
        }

        // A delay past the end of the clock never fires rather than panicking.
        let deadline = self.core.clock.now().saturating_add(delay);
        let seq = self
            .core
            .timers
            .borrow_mut()
            .push(deadline, Rc::clone(&shared));
        trace!(timer = %id, seq, ?deadline, "timer scheduled");

        TimerHandle { shared }
    }

    /// Runs `future` on this scheduler and exposes its result as a task.
    ///
    /// The future is polled from the microtask drain. Cancelling the
    /// returned task drops the future at its next suspension point.
    pub fn spawn<F, T, E>(&self, future: F) -> Task<T, E>
    where
        F: Future<Output = Result<T, E>> + 'static,
        T: 'static,
        E: 'static,
    {
        let task = Task::new(self);
        let target = task.clone();

        let key = self.core.local.spawn(Box::pin(async move {
            let result = future.await;
            target.settle(Settled::from(result));
        }));

        let scheduler = self.downgrade();
        task.on_settle(move |settled| {
            if !matches!(settled, Settled::Cancelled) {
                return;
            }

            if let Some(scheduler) = scheduler.upgrade()
                && scheduler.core.local.cancel(key)
            {
                debug!("dropped spawned future of a cancelled task");
            }
        });

        task
    }

    /// Runs a single tick. Returns `true` if any callback or timer ran.
    pub fn tick(&self) -> bool {
        let drained = self.drain_microtasks();
        let fired = self.fire_due_timers();

        drained > 0 || fired > 0
    }

    /// Runs until idle: no queued callbacks, no woken futures and no pending
    /// timers. Waits for the clock whenever only future timers remain.
    pub fn run(&self) -> Result<(), RunError> {
        match self.drive(|| false) {
            Err(RunError::Stalled) => Ok(()),
            other => other,
        }
    }

    /// Runs until `task` settles and returns its outcome.
    ///
    /// Fails with [`RunError::Stalled`] if the loop goes idle first.
    pub fn run_until<T, E>(&self, task: &Task<T, E>) -> Result<Settled<T, E>, RunError>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        self.drive(|| !task.is_pending())?;
        task.settled().ok_or(RunError::Stalled)
    }

    /// Runs `future` to completion on this scheduler, driving the loop until
    /// it produces its output.
    pub fn block_on<F>(&self, future: F) -> Result<F::Output, RunError>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let output = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&output);

        self.core.local.spawn(Box::pin(async move {
            let value = future.await;
            *slot.borrow_mut() = Some(value);
        }));

        self.drive(|| output.borrow().is_some())?;

        let value = output.borrow_mut().take();
        value.ok_or(RunError::Stalled)
    }

    /// Drains the callbacks that are already queued, then stops the loop.
    ///
    /// Pending timers are cancelled and spawned futures dropped. Afterwards
    /// new callbacks and timers are discarded and every run method fails
    /// with [`RunError::Closed`].
    pub fn shutdown(&self) {
        if self.core.closed.get() {
            return;
        }

        let _guard = self.core.span.enter();
        let drained = self.drain_microtasks();

        self.core.closed.set(true);
        let cancelled = self.core.timers.borrow_mut().clear();
        for timer in &cancelled {
            timer.release();
        }
        let leftovers = mem::take(&mut *self.core.microtasks.borrow_mut());
        let futures = self.core.local.len();
        self.core.local.clear();
        drop(leftovers);

        info!(
            drained,
            cancelled = cancelled.len(),
            futures,
            "scheduler shut down"
        );
    }

    pub(crate) fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            core: Rc::downgrade(&self.core),
        }
    }

    fn drive(&self, mut done: impl FnMut() -> bool) -> Result<(), RunError> {
        if self.core.closed.get() {
            return Err(RunError::Closed);
        }

        let _guard = self.core.span.enter();
        let mut ticks = 0u64;

        while !done() {
            if let Some(limit) = self.core.max_ticks
                && ticks >= limit
            {
                warn!(limit, "tick limit reached");
                return Err(RunError::TickLimit { limit });
            }
            ticks += 1;

            if self.tick() {
                continue;
            }

            let next = self.core.timers.borrow_mut().next_deadline();
            match next {
                Some(deadline) => {
                    trace!(?deadline, "waiting for the next timer");
                    self.core.clock.wait_until(deadline);
                }
                None => return Err(RunError::Stalled),
            }
        }

        Ok(())
    }

    fn drain_microtasks(&self) -> usize {
        let mut ran = 0;

        loop {
            let job = self.core.microtasks.borrow_mut().pop_front();

            match job {
                Some(job) => job(),
                None if self.core.local.poll_next() => {}
                None => break,
            }

            ran += 1;
        }

        if ran > 0 {
            trace!(callbacks = ran, "microtasks drained");
        }

        ran
    }

    fn fire_due_timers(&self) -> usize {
        let now = self.core.clock.now();
        let horizon = self.core.timers.borrow().horizon();
        let mut fired = 0;

        loop {
            let due = self.core.timers.borrow_mut().pop_due(now, horizon);
            let Some((deadline, timer)) = due else {
                break;
            };

            trace!(timer = %timer.id(), ?deadline, "timer fired");
            fired += 1;

            if let Some(period) = timer.run() {
                if self.core.closed.get() {
                    timer.discard();
                } else {
                    self.core
                        .timers
                        .borrow_mut()
                        .push(deadline.saturating_add(period), timer);
                }
            }
        }

        fired
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("clock", &self.core.clock.kind())
            .field("now", &self.core.clock.now())
            .field("microtasks", &self.core.microtasks.borrow().len())
            .field("timers", &self.core.timers.borrow().live())
            .field("futures", &self.core.local.len())
            .field("closed", &self.core.closed.get())
            .finish()
    }
}

/// A non-owning handle to a scheduler.
///
/// Tasks and signals hold one of these, so the scheduler's queues never
/// keep the scheduler itself alive.
#[derive(Clone)]
pub(crate) struct WeakScheduler {
    core: Weak<Core>,
}

impl WeakScheduler {
    pub(crate) fn upgrade(&self) -> Option<Scheduler> {
        Some(Scheduler {
            core: self.core.upgrade()?,
        })
    }

    pub(crate) fn queue_microtask(&self, job: Microtask) {
        match self.upgrade() {
            Some(scheduler) => scheduler.push_microtask(job),
            None => warn!("scheduler dropped, discarding callback"),
        }
    }
}
