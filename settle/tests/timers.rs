mod common;

use common::{Journal, virtual_scheduler};
use settle::{RunError, Scheduler};

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn test_synchronous_code_runs_before_zero_delay_timer() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    journal.push("start");
    scheduler.schedule(Duration::ZERO, journal.recorder("timeout"));
    journal.push("end");

    scheduler.run().unwrap();

    assert_eq!(journal.entries(), ["start", "end", "timeout"]);
}

#[test]
fn test_microtasks_drain_before_due_timers() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    scheduler.schedule(Duration::ZERO, journal.recorder("timer"));
    scheduler.queue_microtask(journal.recorder("microtask"));

    scheduler.run().unwrap();

    assert_eq!(journal.entries(), ["microtask", "timer"]);
}

#[test]
fn test_timers_fire_by_deadline() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    scheduler.schedule(ms(100), journal.recorder("100ms"));
    scheduler.schedule(ms(0), journal.recorder("0ms"));
    scheduler.schedule(ms(50), journal.recorder("50ms"));

    scheduler.run().unwrap();

    assert_eq!(journal.entries(), ["0ms", "50ms", "100ms"]);
    assert_eq!(scheduler.now(), ms(100));
}

#[test]
fn test_equal_deadlines_fire_in_schedule_order() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    scheduler.schedule(ms(10), journal.recorder("first"));
    scheduler.schedule(ms(10), journal.recorder("second"));
    scheduler.schedule(ms(5), journal.recorder("early"));
    scheduler.schedule(ms(10), journal.recorder("third"));

    scheduler.run().unwrap();

    assert_eq!(journal.entries(), ["early", "first", "second", "third"]);
}

#[test]
fn test_negative_delay_is_clamped_to_zero() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    scheduler.schedule_ms(1, journal.recorder("one"));
    scheduler.schedule_ms(-20, journal.recorder("clamped"));

    assert!(scheduler.tick());
    assert_eq!(journal.entries(), ["clamped"]);
    assert_eq!(scheduler.now(), Duration::ZERO);

    scheduler.run().unwrap();
    assert_eq!(journal.entries(), ["clamped", "one"]);
}

#[test]
fn test_cancelled_timer_never_fires() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    let handle = scheduler.schedule(ms(10), journal.recorder("cancelled"));
    scheduler.schedule(ms(20), journal.recorder("kept"));

    assert!(scheduler.cancel_timer(&handle));
    assert!(!scheduler.cancel_timer(&handle));
    assert!(handle.is_cancelled());
    assert_eq!(scheduler.pending_timers(), 1);

    scheduler.run().unwrap();

    assert_eq!(journal.entries(), ["kept"]);
    assert_eq!(scheduler.pending_timers(), 0);
    assert!(scheduler.is_idle());
}

#[test]
fn test_cancelled_timer_releases_its_callback_immediately() {
    common::init_test_logging();
    let scheduler = Scheduler::builder().virtual_time().max_ticks(20).build();
    let marker = Rc::new(());

    let captured = Rc::clone(&marker);
    let far = scheduler.schedule(Duration::from_secs(3600), move || drop(captured));
    scheduler.schedule_interval(ms(10), |_| {});

    assert_eq!(Rc::strong_count(&marker), 2);
    assert!(scheduler.cancel_timer(&far));
    assert_eq!(Rc::strong_count(&marker), 1);

    assert_eq!(scheduler.run(), Err(RunError::TickLimit { limit: 20 }));
    assert!(scheduler.now() < Duration::from_secs(3600));
}

#[test]
fn test_delay_past_the_end_of_the_clock_does_not_panic() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    scheduler.schedule(ms(5), journal.recorder("advance"));
    scheduler.run().unwrap();
    assert_eq!(scheduler.now(), ms(5));

    let forever = scheduler.schedule(Duration::MAX, journal.recorder("forever"));
    assert!(forever.is_active());
    assert!(scheduler.cancel_timer(&forever));

    scheduler.run().unwrap();

    assert_eq!(journal.entries(), ["advance"]);
    assert_eq!(scheduler.now(), ms(5));
}

#[test]
fn test_cancel_after_fire_is_a_noop() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    let handle = scheduler.schedule(ms(5), journal.recorder("fired"));
    scheduler.run().unwrap();

    assert!(!handle.is_active());
    assert!(!scheduler.cancel_timer(&handle));
    assert!(!handle.is_cancelled());
    assert_eq!(journal.entries(), ["fired"]);
}

#[test]
fn test_interval_cancels_itself_after_three_runs() {
    let scheduler = virtual_scheduler();
    let count = Rc::new(Cell::new(0));
    let journal = Journal::new();

    let handle = {
        let scheduler_ref = scheduler.clone();
        let count = Rc::clone(&count);
        let journal = journal.clone();

        scheduler.schedule_interval(ms(10), move |timer| {
            count.set(count.get() + 1);
            journal.push(format!("{:?}", scheduler_ref.now()));

            if count.get() == 3 {
                scheduler_ref.cancel_timer(timer);
            }
        })
    };

    scheduler.run().unwrap();

    assert_eq!(count.get(), 3);
    assert_eq!(journal.entries(), ["10ms", "20ms", "30ms"]);
    assert!(handle.is_cancelled());
    assert_eq!(scheduler.now(), ms(30));
}

#[test]
fn test_interval_cancelled_from_outside() {
    let scheduler = virtual_scheduler();
    let count = Rc::new(Cell::new(0));

    let interval = {
        let count = Rc::clone(&count);
        scheduler.schedule_interval(ms(10), move |_| count.set(count.get() + 1))
    };

    let stopper = scheduler.clone();
    scheduler.schedule(ms(35), move || {
        stopper.cancel_timer(&interval);
    });

    scheduler.run().unwrap();

    assert_eq!(count.get(), 3);
    assert_eq!(scheduler.now(), ms(35));
}

#[test]
fn test_timer_scheduled_while_firing_waits_for_next_tick() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    let inner = scheduler.clone();
    let log = journal.clone();
    scheduler.schedule(Duration::ZERO, move || {
        log.push("outer");
        inner.schedule(Duration::ZERO, log.recorder("inner"));
        inner.queue_microtask(log.recorder("microtask"));
    });

    scheduler.run().unwrap();

    assert_eq!(journal.entries(), ["outer", "microtask", "inner"]);
}

#[test]
fn test_tick_limit_stops_endless_interval() {
    common::init_test_logging();
    let scheduler = Scheduler::builder().virtual_time().max_ticks(5).build();

    scheduler.schedule_interval(ms(10), |_| {});

    assert_eq!(scheduler.run(), Err(RunError::TickLimit { limit: 5 }));
}

#[test]
fn test_shutdown_drains_queued_callbacks_and_drops_timers() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    scheduler.queue_microtask(journal.recorder("microtask"));
    let timer = scheduler.schedule(ms(10), journal.recorder("timer"));

    scheduler.shutdown();

    assert!(scheduler.is_closed());
    assert!(timer.is_cancelled());
    assert_eq!(journal.entries(), ["microtask"]);
    assert_eq!(scheduler.run(), Err(RunError::Closed));

    let marker = Rc::new(());
    let captured = Rc::clone(&marker);
    let late = scheduler.schedule(Duration::ZERO, move || drop(captured));
    assert!(late.is_cancelled());
    assert_eq!(Rc::strong_count(&marker), 1);
    assert_eq!(scheduler.pending_timers(), 0);
}

#[test]
fn test_monotonic_clock_waits_for_real_time() {
    common::init_test_logging();
    let scheduler = Scheduler::new();
    let journal = Journal::new();

    let start = Instant::now();
    scheduler.schedule(ms(20), journal.recorder("done"));
    scheduler.run().unwrap();

    assert!(start.elapsed() >= ms(20));
    assert_eq!(journal.entries(), ["done"]);
}
