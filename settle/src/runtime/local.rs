use super::waker::{LocalKey, LocalWaker, WakeQueue};
use crate::utils::Slab;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

pub(crate) type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

/// A future parked in the slab between polls.
struct Slot {
    /// Spawn id, distinguishes reuses of the same slab index.
    id: u64,

    /// `None` while the future is being polled.
    future: Option<LocalFuture>,

    waker: Arc<LocalWaker>,
}

/// The set of futures spawned on a scheduler.
///
/// Futures are polled only from the scheduler's microtask drain. Waking a
/// future pushes its key onto a shared [`WakeQueue`]; the drain pops keys
/// and polls the matching slots.
pub(crate) struct LocalSet {
    slots: RefCell<Slab<Slot>>,
    woken: Arc<WakeQueue>,
    next_id: Cell<u64>,
}

impl LocalSet {
    pub(crate) fn new() -> Self {
        Self {
            slots: RefCell::new(Slab::new(16)),
            woken: Arc::new(WakeQueue::default()),
            next_id: Cell::new(0),
        }
    }

    /// Parks `future` and schedules its first poll.
    pub(crate) fn spawn(&self, future: LocalFuture) -> LocalKey {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let mut slots = self.slots.borrow_mut();
        let key = LocalKey {
            index: slots.next_index(),
            id,
        };

        let waker = LocalWaker::new(key, Arc::clone(&self.woken));
        waker.wake_by_ref();

        let index = slots.insert(Slot {
            id,
            future: Some(future),
            waker,
        });
        debug_assert_eq!(index, key.index);

        key
    }

    /// Drops the future behind `key`, if it is still parked.
    ///
    /// A future that is in the middle of being polled is dropped as soon as
    /// that poll returns.
    pub(crate) fn cancel(&self, key: LocalKey) -> bool {
        let removed = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(key.index) {
                Some(slot) if slot.id == key.id => slots.remove(key.index),
                _ => None,
            }
        };

        removed.is_some()
    }

    /// Polls one woken future. Returns `false` when nothing was woken.
    pub(crate) fn poll_next(&self) -> bool {
        let Some(key) = self.woken.pop() else {
            return false;
        };

        let taken = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(key.index) {
                Some(slot) if slot.id == key.id => slot
                    .future
                    .take()
                    .map(|future| (future, Arc::clone(&slot.waker))),
                _ => None,
            }
        };

        // Stale key: the future already completed or was cancelled.
        let Some((mut future, handle)) = taken else {
            return true;
        };

        handle.reset();
        let waker = Waker::from(handle);
        let mut cx = Context::from_waker(&waker);
        let poll = future.as_mut().poll(&mut cx);

        let finished = {
            let mut slots = self.slots.borrow_mut();
            let current = matches!(slots.get_mut(key.index), Some(slot) if slot.id == key.id);

            match poll {
                Poll::Ready(()) if current => slots.remove(key.index),
                Poll::Pending if current => {
                    if let Some(slot) = slots.get_mut(key.index) {
                        slot.future = Some(future);
                    }
                    return true;
                }
                _ => None,
            }
        };

        drop(finished);
        true
    }

    pub(crate) fn has_woken(&self) -> bool {
        !self.woken.is_empty()
    }

    /// Number of futures still alive.
    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub(crate) fn clear(&self) {
        let drained = std::mem::replace(&mut *self.slots.borrow_mut(), Slab::new(0));
        self.woken.clear();
        drop(drained);
    }
}
