use super::{Verdict, combine};
use crate::runtime::core::Scheduler;
use crate::task::{Settled, Task};

use std::mem;

/// Fulfills with every child's value, in child order, once all of them
/// fulfilled.
///
/// Rejects with the first rejection, as soon as it happens; the other
/// children keep running but their outcomes are ignored. If a child is
/// cancelled before that, the derived task is cancelled too.
///
/// With no children, the derived task is fulfilled with an empty vector.
///
/// # Examples
///
/// ```rust,ignore
/// let both = all(&scheduler, [fetch_user(&scheduler), fetch_posts(&scheduler)]);
/// ```
pub fn all<T, E, I>(scheduler: &Scheduler, children: I) -> Task<Vec<T>, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Task<T, E>>,
{
    let children: Vec<_> = children.into_iter().collect();

    if children.is_empty() {
        return Task::fulfilled(scheduler, Vec::new());
    }

    let mut values: Vec<Option<T>> = children.iter().map(|_| None).collect();
    let mut remaining = children.len();

    combine(scheduler, "all", children, move |index, settled| match settled {
        Settled::Fulfilled(value) => {
            values[index] = Some(value.clone());
            remaining -= 1;

            if remaining > 0 {
                return Verdict::Wait;
            }

            Verdict::Fulfill(mem::take(&mut values).into_iter().flatten().collect())
        }
        Settled::Rejected(reason) => Verdict::Reject(reason.clone()),
        Settled::Cancelled => Verdict::Cancel,
    })
}
