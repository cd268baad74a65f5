use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

/// Identifier of a scheduled timer, unique within its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Lifecycle of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerState {
    /// Sitting in the queue, waiting for its deadline.
    Armed,
    /// Popped from the queue; its callback is running.
    Firing,
    /// One-shot timer whose callback already ran.
    Fired,
    /// Cancelled before (or while) firing. Terminal.
    Cancelled,
}

pub(crate) enum TimerCallback {
    Once(Option<Box<dyn FnOnce()>>),
    Every {
        period: Duration,
        callback: Box<dyn FnMut(&TimerHandle)>,
    },
}

/// State shared between a queued entry and the caller's [`TimerHandle`].
pub(crate) struct TimerShared {
    id: TimerId,
    state: Cell<TimerState>,
    callback: RefCell<TimerCallback>,
}

impl TimerShared {
    pub(crate) fn new(id: TimerId, callback: TimerCallback) -> Rc<Self> {
        Rc::new(Self {
            id,
            state: Cell::new(TimerState::Armed),
            callback: RefCell::new(callback),
        })
    }

    pub(crate) fn id(&self) -> TimerId {
        self.id
    }

    /// Marks a timer that never made it into a queue, or will not go back
    /// into one, as cancelled.
    pub(crate) fn discard(&self) {
        self.state.set(TimerState::Cancelled);
        self.release();
    }

    /// Drops the callback of a timer that will not fire again, together
    /// with everything it captured.
    ///
    /// An interval cancelled from inside its own callback is released by
    /// [`run`](Self::run) once that callback returns.
    pub(crate) fn release(&self) {
        let callback = match self.callback.try_borrow_mut() {
            Ok(mut slot) => mem::replace(&mut *slot, TimerCallback::Once(None)),
            Err(_) => return,
        };

        drop(callback);
    }

    /// Runs the timer callback.
    ///
    /// Returns the period to re-arm with when this is an interval that was
    /// not cancelled from inside its own callback.
    pub(crate) fn run(self: &Rc<Self>) -> Option<Duration> {
        let handle = TimerHandle {
            shared: Rc::clone(self),
        };

        let (once, period) = {
            let mut slot = self.callback.borrow_mut();
            match &mut *slot {
                TimerCallback::Once(f) => (f.take(), None),
                TimerCallback::Every { period, callback } => {
                    callback(&handle);
                    (None, Some(*period))
                }
            }
        };

        if let Some(period) = period {
            if self.state.get() == TimerState::Firing {
                return Some(period);
            }

            self.release();
            return None;
        }

        self.state.set(TimerState::Fired);
        if let Some(f) = once {
            f();
        }

        None
    }
}

/// A handle to a timer registered with a [`Scheduler`](crate::Scheduler).
///
/// Pass it to [`Scheduler::cancel_timer`](crate::Scheduler::cancel_timer) to
/// stop the timer. Cloning the handle does not duplicate the timer.
#[derive(Clone)]
pub struct TimerHandle {
    pub(crate) shared: Rc<TimerShared>,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.shared.id
    }

    /// `true` while the timer may still fire.
    pub fn is_active(&self) -> bool {
        matches!(
            self.shared.state.get(),
            TimerState::Armed | TimerState::Firing
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.state.get() == TimerState::Cancelled
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.shared.id)
            .field("state", &self.shared.state.get())
            .finish()
    }
}

/// An entry in the timer queue.
///
/// Entries are ordered by `(deadline, seq)`, where `seq` is assigned at
/// schedule time, so timers with equal deadlines fire in the order they
/// were scheduled.
pub(crate) struct TimerEntry {
    pub(crate) deadline: Duration,
    pub(crate) seq: u64,
    pub(crate) timer: Rc<TimerShared>,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Reversed so that `BinaryHeap<TimerEntry>` pops the earliest
    /// `(deadline, seq)` first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.deadline, other.seq).cmp(&(self.deadline, self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending timers.
///
/// Cancelled entries stay in the heap until they reach the top and are
/// discarded lazily; `live` only counts entries that can still fire.
pub(crate) struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    next_seq: u64,
    live: usize,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            live: 0,
        }
    }

    /// Queues `timer` to fire at `deadline`.
    pub(crate) fn push(&mut self, deadline: Duration, timer: Rc<TimerShared>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        timer.state.set(TimerState::Armed);
        self.live += 1;
        self.heap.push(TimerEntry {
            deadline,
            seq,
            timer,
        });

        seq
    }

    /// Sequence number the next pushed entry will receive.
    ///
    /// A firing phase only pops entries below the horizon taken at its
    /// start, so timers scheduled while firing wait for the next tick.
    pub(crate) fn horizon(&self) -> u64 {
        self.next_seq
    }

    /// Pops the earliest entry if it is due at `now` and was queued before
    /// `horizon`. The popped timer moves to the firing state.
    pub(crate) fn pop_due(
        &mut self,
        now: Duration,
        horizon: u64,
    ) -> Option<(Duration, Rc<TimerShared>)> {
        loop {
            let head = self.heap.peek()?;

            if head.timer.state.get() != TimerState::Armed {
                self.heap.pop();
                continue;
            }

            if head.deadline > now || head.seq >= horizon {
                return None;
            }

            let entry = self.heap.pop()?;
            entry.timer.state.set(TimerState::Firing);
            self.live -= 1;

            return Some((entry.deadline, entry.timer));
        }
    }

    /// Deadline of the earliest live entry.
    pub(crate) fn next_deadline(&mut self) -> Option<Duration> {
        while let Some(head) = self.heap.peek() {
            if head.timer.state.get() == TimerState::Armed {
                return Some(head.deadline);
            }
            self.heap.pop();
        }

        None
    }

    /// Cancels `timer`. Returns `false` if it already fired or was cancelled.
    ///
    /// The callback is left in place; see [`TimerShared::release`].
    pub(crate) fn cancel(&mut self, timer: &TimerShared) -> bool {
        match timer.state.get() {
            TimerState::Armed => {
                timer.state.set(TimerState::Cancelled);
                self.live -= 1;
                true
            }
            TimerState::Firing => {
                timer.state.set(TimerState::Cancelled);
                true
            }
            TimerState::Fired | TimerState::Cancelled => false,
        }
    }

    /// Number of timers that can still fire.
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Cancels every queued timer and returns the ones that were still
    /// live, so the caller can release them once the queue is unborrowed.
    pub(crate) fn clear(&mut self) -> Vec<Rc<TimerShared>> {
        self.live = 0;

        self.heap
            .drain()
            .filter(|entry| entry.timer.state.get() == TimerState::Armed)
            .map(|entry| {
                entry.timer.state.set(TimerState::Cancelled);
                entry.timer
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn once(id: u64) -> Rc<TimerShared> {
        TimerShared::new(TimerId(id), TimerCallback::Once(Some(Box::new(|| {}))))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn pops_by_deadline_then_sequence() {
        let mut queue = TimerQueue::new();
        queue.push(ms(100), once(1));
        queue.push(ms(0), once(2));
        queue.push(ms(50), once(3));
        queue.push(ms(50), once(4));

        let horizon = queue.horizon();
        let order: Vec<u64> = std::iter::from_fn(|| queue.pop_due(ms(100), horizon))
            .map(|(_, timer)| timer.id().0)
            .collect();

        assert_eq!(order, vec![2, 3, 4, 1]);
        assert_eq!(queue.live(), 0);
    }

    #[test]
    fn entries_past_horizon_are_not_popped() {
        let mut queue = TimerQueue::new();
        queue.push(ms(0), once(1));
        let horizon = queue.horizon();
        queue.push(ms(0), once(2));

        assert!(queue.pop_due(ms(0), horizon).is_some());
        assert!(queue.pop_due(ms(0), horizon).is_none());
        assert_eq!(queue.live(), 1);
    }

    #[test]
    fn cancelled_entries_are_skipped() {
        let mut queue = TimerQueue::new();
        let first = once(1);
        queue.push(ms(10), first.clone());
        queue.push(ms(20), once(2));

        assert!(queue.cancel(&first));
        assert!(!queue.cancel(&first));
        assert_eq!(queue.live(), 1);
        assert_eq!(queue.next_deadline(), Some(ms(20)));
    }

    #[test]
    fn firing_once_marks_fired() {
        let mut queue = TimerQueue::new();
        queue.push(ms(0), once(1));

        let (_, timer) = queue.pop_due(ms(0), queue.horizon()).unwrap();
        assert_eq!(timer.run(), None);
        assert!(!queue.cancel(&timer));
    }

    #[test]
    fn released_timer_drops_its_captures() {
        let mut queue = TimerQueue::new();
        let marker = Rc::new(());
        let captured = Rc::clone(&marker);
        let timer = TimerShared::new(
            TimerId(1),
            TimerCallback::Once(Some(Box::new(move || drop(captured)))),
        );
        queue.push(ms(3_600_000), Rc::clone(&timer));

        assert!(queue.cancel(&timer));
        timer.release();

        // The entry itself is still in the heap, discarded lazily.
        assert_eq!(queue.heap.len(), 1);
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn interval_cancelled_from_its_callback_is_released() {
        let queue = Rc::new(RefCell::new(TimerQueue::new()));
        let marker = Rc::new(());

        let captured = Rc::clone(&marker);
        let owner = Rc::clone(&queue);
        let timer = TimerShared::new(
            TimerId(1),
            TimerCallback::Every {
                period: ms(10),
                callback: Box::new(move |handle| {
                    let _keep = &captured;
                    owner.borrow_mut().cancel(&handle.shared);
                }),
            },
        );
        queue.borrow_mut().push(ms(10), Rc::clone(&timer));

        let horizon = queue.borrow().horizon();
        let due = queue.borrow_mut().pop_due(ms(10), horizon);
        let (_, fired) = due.unwrap();

        assert_eq!(fired.run(), None);
        assert_eq!(fired.state.get(), TimerState::Cancelled);
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn clear_returns_live_timers_only() {
        let mut queue = TimerQueue::new();
        let cancelled = once(1);
        queue.push(ms(10), cancelled.clone());
        queue.push(ms(20), once(2));
        queue.cancel(&cancelled);

        let live = queue.clear();

        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id(), TimerId(2));
        assert_eq!(queue.live(), 0);
    }
}
