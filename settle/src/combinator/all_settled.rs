use super::{Verdict, combine};
use crate::runtime::core::Scheduler;
use crate::task::{Settled, Task};

use std::convert::Infallible;
use std::mem;

/// Fulfills with every child's outcome, in child order, once all of them
/// settled. Never rejects.
///
/// Cancelled children show up as [`Settled::Cancelled`]. With no children
/// the derived task is fulfilled with an empty vector.
pub fn all_settled<T, E, I>(scheduler: &Scheduler, children: I) -> Task<Vec<Settled<T, E>>, Infallible>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Task<T, E>>,
{
    let children: Vec<_> = children.into_iter().collect();

    if children.is_empty() {
        return Task::fulfilled(scheduler, Vec::new());
    }

    let mut outcomes: Vec<Option<Settled<T, E>>> = children.iter().map(|_| None).collect();
    let mut remaining = children.len();

    combine(scheduler, "all_settled", children, move |index, settled| {
        outcomes[index] = Some(settled.clone());
        remaining -= 1;

        if remaining > 0 {
            return Verdict::Wait;
        }

        Verdict::Fulfill(mem::take(&mut outcomes).into_iter().flatten().collect())
    })
}
