//! Cooperative cancellation.
//!
//! A [`CancelSignal`] is a shareable abort flag. Work that supports
//! cancellation registers a listener with [`CancelSignal::on_abort`] and
//! stops (settling its task as cancelled) when the signal aborts. Aborting
//! never interrupts a running callback; it only tells listeners to react.

use crate::runtime::core::{Scheduler, WeakScheduler};
use crate::task::Task;

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

type Listener = Box<dyn FnOnce()>;

/// Token returned by [`CancelSignal::on_abort`], used to withdraw a
/// listener that is no longer needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct SignalInner {
    aborted: bool,

    /// Listeners in registration order. Emptied on abort.
    listeners: Vec<(ListenerId, Listener)>,

    next_listener: u64,
}

/// A shareable cancellation token.
///
/// Clones share the same flag. Aborting is idempotent: listeners run at
/// most once, in registration order.
#[derive(Clone)]
pub struct CancelSignal {
    inner: Rc<RefCell<SignalInner>>,
    scheduler: WeakScheduler,
}

impl CancelSignal {
    /// Creates a signal that has not aborted yet.
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                aborted: false,
                listeners: Vec::new(),
                next_listener: 0,
            })),
            scheduler: scheduler.downgrade(),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.borrow().aborted
    }

    /// Aborts the signal and runs every registered listener, in
    /// registration order, before returning.
    ///
    /// Returns `false` if the signal had already aborted; nothing runs then.
    pub fn abort(&self) -> bool {
        let listeners = {
            let mut inner = self.inner.borrow_mut();

            if inner.aborted {
                trace!("signal already aborted");
                return false;
            }

            inner.aborted = true;
            mem::take(&mut inner.listeners)
        };

        debug!(listeners = listeners.len(), "signal aborted");

        for (_, listener) in listeners {
            listener();
        }

        true
    }

    /// Registers `listener` to run when the signal aborts.
    ///
    /// If the signal has already aborted, the listener is queued for the
    /// next microtask drain instead of running synchronously.
    pub fn on_abort<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce() + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;

        if inner.aborted {
            drop(inner);
            self.scheduler.queue_microtask(Box::new(listener));
            return id;
        }

        inner.listeners.push((id, Box::new(listener)));
        id
    }

    /// Withdraws a listener that has not run yet.
    ///
    /// Work that finished on its own should remove its listeners, so a
    /// long-lived signal does not accumulate them.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(l, _)| *l != id);

        inner.listeners.len() != before
    }

    /// Number of listeners waiting for an abort.
    pub fn pending_listeners(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub(crate) fn downgrade(&self) -> WeakSignal {
        WeakSignal {
            inner: Rc::downgrade(&self.inner),
            scheduler: self.scheduler.clone(),
        }
    }

    /// Binds `task` to this signal: aborting cancels it if still pending.
    pub fn bind<T: 'static, E: 'static>(&self, task: &Task<T, E>) {
        task.cancel_on(self);
    }
}

/// A non-owning reference to a signal, for listeners that must not keep
/// it alive.
#[derive(Clone)]
pub(crate) struct WeakSignal {
    inner: Weak<RefCell<SignalInner>>,
    scheduler: WeakScheduler,
}

impl WeakSignal {
    pub(crate) fn upgrade(&self) -> Option<CancelSignal> {
        Some(CancelSignal {
            inner: self.inner.upgrade()?,
            scheduler: self.scheduler.clone(),
        })
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("CancelSignal")
            .field("aborted", &inner.aborted)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}
