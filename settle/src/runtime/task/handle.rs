use super::core::Task;
use crate::error::TaskError;

use std::cell::RefCell;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// A future that resolves once a task settles.
///
/// Obtained by awaiting a [`Task`] (it implements [`IntoFuture`]). Resolves
/// to `Ok(value)` when the task is fulfilled, or to a [`TaskError`] when it
/// is rejected or cancelled.
///
/// Dropping the future does **not** cancel the task; it only discards the
/// ability to observe its outcome.
pub struct TaskFuture<T, E> {
    task: Task<T, E>,

    /// Latest waker, shared with the settlement observer.
    waker: Option<Rc<RefCell<Waker>>>,
}

impl<T, E> Future for TaskFuture<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, TaskError<E>>;

    /// Registers a single settlement observer on the first pending poll;
    /// later polls only refresh the waker it wakes.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(settled) = this.task.settled() {
            return Poll::Ready(settled.into_result());
        }

        match &this.waker {
            Some(slot) => {
                let mut waker = slot.borrow_mut();
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }
            }
            None => {
                let slot = Rc::new(RefCell::new(cx.waker().clone()));
                let notify = Rc::clone(&slot);

                this.task.on_settle(move |_| notify.borrow().wake_by_ref());
                this.waker = Some(slot);
            }
        }

        Poll::Pending
    }
}

impl<T, E> IntoFuture for Task<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, TaskError<E>>;
    type IntoFuture = TaskFuture<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        TaskFuture {
            task: self,
            waker: None,
        }
    }
}
