use super::{Verdict, combine};
use crate::runtime::core::Scheduler;
use crate::task::{Settled, Task};

/// Settles like the first child to fulfill or reject.
///
/// Cancelled children drop out of the race. The derived task is cancelled
/// only when every child was cancelled. With no children it stays pending
/// forever.
pub fn race<T, E, I>(scheduler: &Scheduler, children: I) -> Task<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Task<T, E>>,
{
    let children: Vec<_> = children.into_iter().collect();
    let mut remaining = children.len();

    combine(scheduler, "race", children, move |_, settled| match settled {
        Settled::Fulfilled(value) => Verdict::Fulfill(value.clone()),
        Settled::Rejected(reason) => Verdict::Reject(reason.clone()),
        Settled::Cancelled => {
            remaining -= 1;

            if remaining == 0 {
                Verdict::Cancel
            } else {
                Verdict::Wait
            }
        }
    })
}
