use super::state::{Settled, Status};
use crate::runtime::core::{Scheduler, WeakScheduler};
use crate::signal::CancelSignal;

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a task, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Token returned by [`Task::on_settle`], used to withdraw an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Observer<T, E> = Box<dyn FnOnce(&Settled<T, E>)>;

struct TaskInner<T, E> {
    id: TaskId,

    /// `None` while pending. Set exactly once.
    outcome: Option<Rc<Settled<T, E>>>,

    /// Observers waiting for settlement, in subscription order.
    observers: Vec<(Subscription, Observer<T, E>)>,

    next_subscription: u64,
}

/// A unit of deferred work with a one-way settlement lifecycle.
///
/// A `Task` starts out pending and settles exactly once, as fulfilled with a
/// value, rejected with a reason, or cancelled. Later attempts to settle it
/// are ignored, so the first settlement always wins.
///
/// `Task` is a cheap handle: clones refer to the same task. Observers never
/// run synchronously; they are queued on the owning [`Scheduler`] and fire
/// in subscription order during its next microtask drain.
pub struct Task<T, E> {
    inner: Rc<RefCell<TaskInner<T, E>>>,
    scheduler: WeakScheduler,
}

impl<T, E> Clone for Task<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Task<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Task")
            .field("id", &inner.id)
            .field("status", &inner.outcome.as_ref().map(|o| o.status()))
            .finish()
    }
}

impl<T: 'static, E: 'static> Task<T, E> {
    /// Creates a pending task owned by `scheduler`.
    pub fn new(scheduler: &Scheduler) -> Self {
        Self::with_scheduler(scheduler.downgrade())
    }

    fn with_scheduler(scheduler: WeakScheduler) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TaskInner {
                id: TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)),
                outcome: None,
                observers: Vec::new(),
                next_subscription: 0,
            })),
            scheduler,
        }
    }

    /// Creates a task that is already fulfilled with `value`.
    pub fn fulfilled(scheduler: &Scheduler, value: T) -> Self {
        let task = Self::new(scheduler);
        task.fulfill(value);
        task
    }

    /// Creates a task that is already rejected with `reason`.
    pub fn rejected(scheduler: &Scheduler, reason: E) -> Self {
        let task = Self::new(scheduler);
        task.reject(reason);
        task
    }

    /// Creates a task that is already cancelled.
    pub fn cancelled(scheduler: &Scheduler) -> Self {
        let task = Self::new(scheduler);
        task.cancel();
        task
    }

    pub fn id(&self) -> TaskId {
        self.inner.borrow().id
    }

    /// Terminal status, or `None` while pending.
    pub fn status(&self) -> Option<Status> {
        self.inner.borrow().outcome.as_ref().map(|o| o.status())
    }

    pub fn is_pending(&self) -> bool {
        self.inner.borrow().outcome.is_none()
    }

    /// A copy of the outcome, or `None` while pending.
    pub fn settled(&self) -> Option<Settled<T, E>>
    where
        T: Clone,
        E: Clone,
    {
        self.inner.borrow().outcome.as_deref().cloned()
    }

    /// Fulfills the task. Returns `false` (and does nothing) if it had
    /// already settled.
    pub fn fulfill(&self, value: T) -> bool {
        self.settle(Settled::Fulfilled(value))
    }

    /// Rejects the task. Returns `false` (and does nothing) if it had
    /// already settled.
    pub fn reject(&self, reason: E) -> bool {
        self.settle(Settled::Rejected(reason))
    }

    /// Cancels the task. Returns `false` (and does nothing) if it had
    /// already settled.
    pub fn cancel(&self) -> bool {
        self.settle(Settled::Cancelled)
    }

    /// Moves the task to `outcome` if it is still pending.
    pub fn settle(&self, outcome: Settled<T, E>) -> bool {
        let (id, settled, observers) = {
            let mut inner = self.inner.borrow_mut();

            if inner.outcome.is_some() {
                trace!(task = %inner.id, "ignoring settlement of an already settled task");
                return false;
            }

            let settled = Rc::new(outcome);
            inner.outcome = Some(Rc::clone(&settled));

            (inner.id, settled, mem::take(&mut inner.observers))
        };

        debug!(
            task = %id,
            status = ?settled.status(),
            observers = observers.len(),
            "task settled"
        );

        for (_, observer) in observers {
            self.deliver(Rc::clone(&settled), observer);
        }

        true
    }

    /// Registers `observer` to run once the task settles.
    ///
    /// If the task has already settled, the observer is queued for the next
    /// microtask drain; it is never invoked before this call returns.
    pub fn on_settle<F>(&self, observer: F) -> Subscription
    where
        F: FnOnce(&Settled<T, E>) + 'static,
    {
        let (subscription, settled) = {
            let mut inner = self.inner.borrow_mut();
            let subscription = Subscription(inner.next_subscription);
            inner.next_subscription += 1;

            match inner.outcome.clone() {
                Some(settled) => (subscription, settled),
                None => {
                    inner.observers.push((subscription, Box::new(observer)));
                    return subscription;
                }
            }
        };

        self.deliver(settled, Box::new(observer));
        subscription
    }

    /// Withdraws an observer that has not been delivered yet.
    ///
    /// Returns `false` if the observer already fired, was already queued, or
    /// was removed before.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.observers.len();
        inner.observers.retain(|(s, _)| *s != subscription);

        inner.observers.len() != before
    }

    /// Cancels this task when `signal` aborts.
    ///
    /// If the signal has already aborted, the task is cancelled during the
    /// next microtask drain. The signal only keeps a weak reference, and
    /// the listener is withdrawn once the task settles some other way.
    pub fn cancel_on(&self, signal: &CancelSignal) {
        let task = self.downgrade();

        let listener = signal.on_abort(move || {
            if let Some(task) = task.upgrade()
                && task.cancel()
            {
                debug!(task = %task.id(), "task cancelled by signal");
            }
        });

        let signal = signal.downgrade();
        self.on_settle(move |_| {
            if let Some(signal) = signal.upgrade()
                && signal.remove_listener(listener)
            {
                trace!("abort listener of a settled task withdrawn");
            }
        });
    }

    pub(crate) fn downgrade(&self) -> WeakTask<T, E> {
        WeakTask {
            inner: Rc::downgrade(&self.inner),
            scheduler: self.scheduler.clone(),
        }
    }

    fn deliver(&self, settled: Rc<Settled<T, E>>, observer: Observer<T, E>) {
        self.scheduler
            .queue_microtask(Box::new(move || observer(&settled)));
    }
}

impl<T, E> Task<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Settles this task with the same outcome as `source`, once it settles.
    pub fn adopt(&self, source: &Task<T, E>) {
        let task = self.clone();
        source.on_settle(move |settled| {
            task.settle(settled.clone());
        });
    }

    /// Derives a task whose value is `f` applied to this task's value.
    ///
    /// Rejection and cancellation pass through unchanged.
    pub fn map<U, F>(&self, f: F) -> Task<U, E>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.chain(move |settled, next: &Task<U, E>| match settled {
            Settled::Fulfilled(value) => {
                next.fulfill(f(value.clone()));
            }
            Settled::Rejected(reason) => {
                next.reject(reason.clone());
            }
            Settled::Cancelled => {
                next.cancel();
            }
        })
    }

    /// Derives a task whose rejection reason is `f` applied to this task's.
    pub fn map_err<F2, F>(&self, f: F) -> Task<T, F2>
    where
        F2: 'static,
        F: FnOnce(E) -> F2 + 'static,
    {
        self.chain(move |settled, next: &Task<T, F2>| match settled {
            Settled::Fulfilled(value) => {
                next.fulfill(value.clone());
            }
            Settled::Rejected(reason) => {
                next.reject(f(reason.clone()));
            }
            Settled::Cancelled => {
                next.cancel();
            }
        })
    }

    /// Starts the next stage with this task's value.
    ///
    /// The derived task settles like the task returned by `f`. If this task
    /// rejects or is cancelled, `f` never runs.
    pub fn and_then<U, F>(&self, f: F) -> Task<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Task<U, E> + 'static,
    {
        self.chain(move |settled, next: &Task<U, E>| match settled {
            Settled::Fulfilled(value) => next.adopt(&f(value.clone())),
            Settled::Rejected(reason) => {
                next.reject(reason.clone());
            }
            Settled::Cancelled => {
                next.cancel();
            }
        })
    }

    /// Recovers from a rejection by starting the task returned by `f`.
    pub fn or_else<F2, F>(&self, f: F) -> Task<T, F2>
    where
        F2: Clone + 'static,
        F: FnOnce(E) -> Task<T, F2> + 'static,
    {
        self.chain(move |settled, next: &Task<T, F2>| match settled {
            Settled::Fulfilled(value) => {
                next.fulfill(value.clone());
            }
            Settled::Rejected(reason) => next.adopt(&f(reason.clone())),
            Settled::Cancelled => {
                next.cancel();
            }
        })
    }

    /// Runs `f` once this task settles, whatever the outcome, then settles
    /// the derived task with the same outcome.
    pub fn finally<F>(&self, f: F) -> Task<T, E>
    where
        F: FnOnce(Status) + 'static,
    {
        self.chain(move |settled, next: &Task<T, E>| {
            f(settled.status());
            next.settle(settled.clone());
        })
    }

    fn chain<U, F2, F>(&self, step: F) -> Task<U, F2>
    where
        U: 'static,
        F2: 'static,
        F: FnOnce(&Settled<T, E>, &Task<U, F2>) + 'static,
    {
        let next = Task::with_scheduler(self.scheduler.clone());

        let target = next.clone();
        self.on_settle(move |settled| step(settled, &target));

        next
    }
}

/// A non-owning reference to a task.
pub(crate) struct WeakTask<T, E> {
    inner: Weak<RefCell<TaskInner<T, E>>>,
    scheduler: WeakScheduler,
}

impl<T, E> Clone for WeakTask<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> WeakTask<T, E> {
    pub(crate) fn upgrade(&self) -> Option<Task<T, E>> {
        Some(Task {
            inner: self.inner.upgrade()?,
            scheduler: self.scheduler.clone(),
        })
    }
}
