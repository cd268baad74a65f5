use super::{Verdict, combine};
use crate::error::AggregateError;
use crate::runtime::core::Scheduler;
use crate::task::{Settled, Task};

use std::mem;

/// Fulfills with the first child value. Rejections are tolerated until
/// every child has settled.
///
/// When no child fulfills, the derived task rejects with an
/// [`AggregateError`] holding every reason in child order, or is cancelled
/// if at least one child was cancelled. With no children it stays pending
/// forever.
pub fn any<T, E, I>(scheduler: &Scheduler, children: I) -> Task<T, AggregateError<E>>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Task<T, E>>,
{
    let children: Vec<_> = children.into_iter().collect();

    let mut reasons: Vec<Option<E>> = children.iter().map(|_| None).collect();
    let mut remaining = children.len();
    let mut cancelled = false;

    combine(scheduler, "any", children, move |index, settled| {
        match settled {
            Settled::Fulfilled(value) => return Verdict::Fulfill(value.clone()),
            Settled::Rejected(reason) => reasons[index] = Some(reason.clone()),
            Settled::Cancelled => cancelled = true,
        }

        remaining -= 1;

        match (remaining, cancelled) {
            (0, true) => Verdict::Cancel,
            (0, false) => Verdict::Reject(AggregateError {
                reasons: mem::take(&mut reasons).into_iter().flatten().collect(),
            }),
            _ => Verdict::Wait,
        }
    })
}
