use crate::runtime::core::Scheduler;
use crate::task::{Settled, Task};

use std::convert::Infallible;
use std::time::Duration;

/// Creates a task that fulfills with `value` once `delay` has elapsed.
///
/// The timer is registered immediately. Cancelling the task stops the
/// timer, so a cancelled delay no longer keeps the loop alive.
///
/// # Examples
///
/// ```rust,ignore
/// let pizza = delay::<_, ()>(&scheduler, Duration::from_millis(2000), "pizza ready");
/// let burger = delay::<_, ()>(&scheduler, Duration::from_millis(1500), "burger ready");
/// ```
pub fn delay<T, E>(scheduler: &Scheduler, delay: Duration, value: T) -> Task<T, E>
where
    T: 'static,
    E: 'static,
{
    let task = Task::new(scheduler);
    let target = task.clone();

    let timer = scheduler.schedule(delay, move || {
        target.fulfill(value);
    });

    let owner = scheduler.downgrade();
    task.on_settle(move |settled| {
        if matches!(settled, Settled::Cancelled)
            && let Some(scheduler) = owner.upgrade()
        {
            scheduler.cancel_timer(&timer);
        }
    });

    task
}

/// Creates a task that fulfills with `()` once `duration` has elapsed.
///
/// Awaiting it from a spawned future suspends that future without blocking
/// the loop.
///
/// ```rust,ignore
/// scheduler.block_on({
///     let scheduler = scheduler.clone();
///     async move {
///         sleep(&scheduler, Duration::from_millis(10)).await.ok();
///     }
/// });
/// ```
pub fn sleep(scheduler: &Scheduler, duration: Duration) -> Task<(), Infallible> {
    delay(scheduler, duration, ())
}
