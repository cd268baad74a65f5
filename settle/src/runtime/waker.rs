use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Wake;

/// Address of a spawned future: its slab index plus the spawn id that
/// guards against the index being reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LocalKey {
    pub(crate) index: usize,
    pub(crate) id: u64,
}

/// Keys of futures that asked to be polled again.
///
/// This is the only scheduler state a [`Waker`](std::task::Waker) touches,
/// so it is the only piece behind a mutex. Wakers may be cloned onto other
/// threads; the futures themselves never leave the scheduler thread.
#[derive(Default)]
pub(crate) struct WakeQueue {
    keys: Mutex<VecDeque<LocalKey>>,
}

impl WakeQueue {
    fn lock(&self) -> MutexGuard<'_, VecDeque<LocalKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, key: LocalKey) {
        self.lock().push_back(key);
    }

    pub(crate) fn pop(&self) -> Option<LocalKey> {
        self.lock().pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }
}

/// Waker state of one spawned future.
///
/// `notified` collapses repeated wake-ups between two polls into a single
/// queue entry.
pub(crate) struct LocalWaker {
    key: LocalKey,
    queue: Arc<WakeQueue>,
    notified: AtomicBool,
}

impl LocalWaker {
    pub(crate) fn new(key: LocalKey, queue: Arc<WakeQueue>) -> Arc<Self> {
        Arc::new(Self {
            key,
            queue,
            notified: AtomicBool::new(false),
        })
    }

    /// Called right before a poll so wake-ups during the poll requeue it.
    pub(crate) fn reset(&self) {
        self.notified.store(false, Ordering::Release);
    }
}

impl Wake for LocalWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if !self.notified.swap(true, Ordering::AcqRel) {
            self.queue.push(self.key);
        }
    }
}
