//! Combinators over groups of tasks.
//!
//! Each combinator takes a scheduler and a sequence of child tasks, and
//! returns a derived task settled by a policy over the children's outcomes:
//!
//! | combinator        | fulfills with                  | rejects with                    |
//! |-------------------|--------------------------------|---------------------------------|
//! | [`all`]           | every value, in child order    | the first rejection             |
//! | [`race`]          | the first fulfilled value      | the first rejection, if first   |
//! | [`any`]           | the first fulfilled value      | an [`AggregateError`] of all    |
//! | [`all_settled`]   | every outcome, in child order  | never                           |
//!
//! Result order always follows input order, never completion order.
//! Cancelling a derived task cancels the children that are still pending.
//!
//! [`Pipeline`] chains dependent stages where each one starts only after the
//! previous stage fulfilled.
//!
//! [`AggregateError`]: crate::AggregateError

mod all;
mod all_settled;
mod any;
mod pipeline;
mod race;

pub use all::all;
pub use all_settled::all_settled;
pub use any::any;
pub use pipeline::Pipeline;
pub use race::race;

use crate::runtime::core::Scheduler;
use crate::runtime::task::WeakTask;
use crate::task::{Settled, Subscription, Task};

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use tracing::debug;

/// What a combinator decides after observing one child.
pub(crate) enum Verdict<D, F> {
    /// Not decided yet.
    Wait,
    Fulfill(D),
    Reject(F),
    Cancel,
}

struct Combine<T, E, S> {
    step: S,

    /// One entry per child, in child order. Emptied once decided.
    subscriptions: Vec<(WeakTask<T, E>, Subscription)>,

    decided: bool,
}

impl<T: 'static, E: 'static, S> Combine<T, E, S> {
    /// Marks the combination as decided and detaches from every child.
    /// Returns the children that were still pending.
    fn detach(&mut self) -> Vec<Task<T, E>> {
        self.decided = true;

        mem::take(&mut self.subscriptions)
            .into_iter()
            .filter_map(|(child, subscription)| {
                let child = child.upgrade()?;
                child.unsubscribe(subscription);
                child.is_pending().then_some(child)
            })
            .collect()
    }
}

/// Subscribes `step` to every child and settles the derived task with the
/// first decisive [`Verdict`].
///
/// `step` sees each child outcome in settlement order, together with the
/// child's index. Nothing here settles the derived task when `children` is
/// empty: [`all`] and [`all_settled`] fulfill before calling in, while
/// [`race`] and [`any`] leave it pending.
pub(crate) fn combine<T, E, D, F, S>(
    scheduler: &Scheduler,
    name: &'static str,
    children: Vec<Task<T, E>>,
    step: S,
) -> Task<D, F>
where
    T: 'static,
    E: 'static,
    D: 'static,
    F: 'static,
    S: FnMut(usize, &Settled<T, E>) -> Verdict<D, F> + 'static,
{
    let derived = Task::new(scheduler);

    debug!(
        combinator = name,
        task = %derived.id(),
        children = children.len(),
        "combining tasks"
    );

    let shared = Rc::new(RefCell::new(Combine {
        step,
        subscriptions: Vec::with_capacity(children.len()),
        decided: false,
    }));

    for (index, child) in children.iter().enumerate() {
        let target = derived.clone();
        let state = Rc::clone(&shared);

        let subscription = child.on_settle(move |settled| {
            let verdict = {
                let mut combine = state.borrow_mut();

                if combine.decided || !target.is_pending() {
                    return;
                }

                (combine.step)(index, settled)
            };

            let outcome = match verdict {
                Verdict::Wait => return,
                Verdict::Fulfill(value) => Settled::Fulfilled(value),
                Verdict::Reject(reason) => Settled::Rejected(reason),
                Verdict::Cancel => Settled::Cancelled,
            };

            state.borrow_mut().detach();

            debug!(
                combinator = name,
                task = %target.id(),
                decided_by = index,
                status = ?outcome.status(),
                "combination decided"
            );
            target.settle(outcome);
        });

        shared
            .borrow_mut()
            .subscriptions
            .push((child.downgrade(), subscription));
    }

    // Settlement coming from outside releases the children. Cancellation is
    // also forwarded to the ones still pending.
    let state = Rc::clone(&shared);
    let id = derived.id();
    derived.on_settle(move |settled| {
        if state.borrow().decided {
            return;
        }

        let pending = state.borrow_mut().detach();

        if !matches!(settled, Settled::Cancelled) {
            debug!(
                combinator = name,
                task = %id,
                status = ?settled.status(),
                "derived task settled externally, children released"
            );
            return;
        }

        debug!(
            combinator = name,
            task = %id,
            children = pending.len(),
            "forwarding cancellation"
        );

        for child in pending {
            child.cancel();
        }
    });

    derived
}
