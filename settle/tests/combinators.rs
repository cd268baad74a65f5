mod common;

use common::{Journal, virtual_scheduler};
use settle::time::delay;
use settle::{AggregateError, Delayed, Scheduler, Settled, Status, Task, all, all_settled, any, race};

use std::rc::Rc;
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn fail_after(scheduler: &Scheduler, after: u64, reason: &str) -> Task<i32, String> {
    scheduler.start(Delayed::fail(ms(after), reason.to_string()), None)
}

// ============================================================================
// ALL
// ============================================================================

#[test]
fn test_all_of_fulfilled_tasks_settles_on_next_tick() {
    let scheduler = virtual_scheduler();
    let children: Vec<_> = (1..=4)
        .map(|v| Task::<i32, String>::fulfilled(&scheduler, v))
        .collect();

    let derived = all(&scheduler, children);
    assert!(derived.is_pending());

    assert!(scheduler.tick());
    assert_eq!(derived.settled(), Some(Settled::Fulfilled(vec![1, 2, 3, 4])));
}

#[test]
fn test_all_keeps_input_order_not_completion_order() {
    let scheduler = virtual_scheduler();

    let derived = all(
        &scheduler,
        [
            delay::<_, String>(&scheduler, ms(30), "slow"),
            delay(&scheduler, ms(10), "fast"),
            delay(&scheduler, ms(20), "medium"),
        ],
    );

    assert_eq!(
        scheduler.run_until(&derived),
        Ok(Settled::Fulfilled(vec!["slow", "fast", "medium"]))
    );
    assert_eq!(scheduler.now(), ms(30));
}

#[test]
fn test_all_rejects_with_first_rejection() {
    let scheduler = virtual_scheduler();
    let first = Task::<i32, String>::new(&scheduler);
    let failing = Task::rejected(&scheduler, "k failed".to_string());
    let last = Task::<i32, String>::new(&scheduler);

    let derived = all(&scheduler, [first.clone(), failing, last.clone()]);
    scheduler.run().unwrap();

    assert_eq!(derived.settled(), Some(Settled::Rejected("k failed".to_string())));

    first.fulfill(1);
    last.reject("later".to_string());
    scheduler.run().unwrap();

    assert_eq!(derived.settled(), Some(Settled::Rejected("k failed".to_string())));
    assert_eq!(first.status(), Some(Status::Fulfilled));
}

#[test]
fn test_all_does_not_cancel_remaining_children() {
    let scheduler = virtual_scheduler();
    let slow = delay::<i32, String>(&scheduler, ms(50), 1);

    let derived = all(&scheduler, [slow.clone(), fail_after(&scheduler, 10, "early")]);
    scheduler.run().unwrap();

    assert_eq!(derived.status(), Some(Status::Rejected));
    assert_eq!(slow.settled(), Some(Settled::Fulfilled(1)));
    assert_eq!(scheduler.now(), ms(50));
}

#[test]
fn test_all_is_cancelled_by_a_cancelled_child() {
    let scheduler = virtual_scheduler();
    let sibling = Task::<i32, String>::new(&scheduler);

    let derived = all(&scheduler, [sibling.clone(), Task::cancelled(&scheduler)]);
    scheduler.run().unwrap();

    assert_eq!(derived.status(), Some(Status::Cancelled));
    assert!(sibling.is_pending());
}

#[test]
fn test_all_tracks_duplicate_children_independently() {
    let scheduler = virtual_scheduler();
    let shared = delay::<_, String>(&scheduler, ms(5), 9);

    let derived = all(&scheduler, [shared.clone(), shared.clone(), shared]);

    assert_eq!(
        scheduler.run_until(&derived),
        Ok(Settled::Fulfilled(vec![9, 9, 9]))
    );
}

#[test]
fn test_all_of_nothing_is_already_fulfilled() {
    let scheduler = virtual_scheduler();
    let derived = all(&scheduler, Vec::<Task<i32, String>>::new());

    assert_eq!(derived.settled(), Some(Settled::Fulfilled(Vec::new())));
}

// ============================================================================
// RACE
// ============================================================================

#[test]
fn test_race_settles_with_earliest_child() {
    let scheduler = virtual_scheduler();
    let journal = Journal::new();

    let children = [
        delay::<_, String>(&scheduler, ms(100), "t1"),
        delay(&scheduler, ms(0), "t2"),
        delay(&scheduler, ms(50), "t3"),
    ];

    for child in &children {
        let journal = journal.clone();
        child.on_settle(move |settled| {
            if let Some(name) = settled.value() {
                journal.push(*name);
            }
        });
    }

    let winner = race(&scheduler, children);
    assert_eq!(scheduler.run_until(&winner), Ok(Settled::Fulfilled("t2")));

    scheduler.run().unwrap();
    assert_eq!(journal.entries(), ["t2", "t3", "t1"]);
}

#[test]
fn test_race_settles_with_first_rejection() {
    let scheduler = virtual_scheduler();

    let winner = race(
        &scheduler,
        [
            delay::<i32, String>(&scheduler, ms(20), 1),
            fail_after(&scheduler, 10, "timeout"),
        ],
    );

    assert_eq!(
        scheduler.run_until(&winner),
        Ok(Settled::Rejected("timeout".to_string()))
    );
}

#[test]
fn test_race_skips_cancelled_children() {
    let scheduler = virtual_scheduler();

    let winner = race(
        &scheduler,
        [
            Task::cancelled(&scheduler),
            delay::<_, String>(&scheduler, ms(10), "x"),
        ],
    );

    assert_eq!(scheduler.run_until(&winner), Ok(Settled::Fulfilled("x")));
}

#[test]
fn test_race_of_cancelled_children_is_cancelled() {
    let scheduler = virtual_scheduler();

    let winner = race(
        &scheduler,
        [
            Task::<i32, String>::cancelled(&scheduler),
            Task::cancelled(&scheduler),
        ],
    );

    assert_eq!(scheduler.run_until(&winner), Ok(Settled::Cancelled));
}

#[test]
fn test_race_of_nothing_stays_pending() {
    let scheduler = virtual_scheduler();
    let winner = race(&scheduler, Vec::<Task<i32, String>>::new());

    scheduler.run().unwrap();
    assert!(winner.is_pending());
}

// ============================================================================
// ANY
// ============================================================================

#[test]
fn test_any_aggregates_reasons_in_child_order() {
    let scheduler = virtual_scheduler();

    let derived = any(
        &scheduler,
        [
            fail_after(&scheduler, 30, "a"),
            fail_after(&scheduler, 10, "b"),
            fail_after(&scheduler, 20, "c"),
        ],
    );

    let expected = AggregateError {
        reasons: vec!["a".to_string(), "b".to_string(), "c".to_string()],
    };
    assert_eq!(scheduler.run_until(&derived), Ok(Settled::Rejected(expected)));
}

#[test]
fn test_any_fulfills_despite_earlier_rejections() {
    let scheduler = virtual_scheduler();

    let derived = any(
        &scheduler,
        [
            fail_after(&scheduler, 5, "first"),
            fail_after(&scheduler, 1, "second"),
            scheduler.start(Delayed::succeed(ms(10), 42), None),
        ],
    );

    assert_eq!(scheduler.run_until(&derived), Ok(Settled::Fulfilled(42)));
}

#[test]
fn test_any_with_cancelled_child_and_no_value_is_cancelled() {
    let scheduler = virtual_scheduler();

    let derived = any(
        &scheduler,
        [fail_after(&scheduler, 5, "first"), Task::cancelled(&scheduler)],
    );

    assert_eq!(scheduler.run_until(&derived), Ok(Settled::Cancelled));
}

#[test]
fn test_aggregate_error_message() {
    let error = AggregateError {
        reasons: vec!["a", "b", "c"],
    };

    assert_eq!(error.to_string(), "all 3 tasks were rejected");
}

// ============================================================================
// ALL-SETTLED
// ============================================================================

#[test]
fn test_all_settled_reports_every_outcome() {
    let scheduler = virtual_scheduler();

    let derived = all_settled(
        &scheduler,
        [
            Task::fulfilled(&scheduler, "A"),
            Task::rejected(&scheduler, "B"),
            Task::cancelled(&scheduler),
        ],
    );

    assert_eq!(
        scheduler.run_until(&derived),
        Ok(Settled::Fulfilled(vec![
            Settled::Fulfilled("A"),
            Settled::Rejected("B"),
            Settled::Cancelled,
        ]))
    );
}

#[test]
fn test_all_settled_outcomes_can_be_filtered() {
    let scheduler = virtual_scheduler();

    let derived = all_settled(
        &scheduler,
        [
            delay::<i32, String>(&scheduler, ms(20), 1),
            fail_after(&scheduler, 10, "down"),
            delay::<i32, String>(&scheduler, ms(5), 3),
        ],
    );

    let Ok(Settled::Fulfilled(outcomes)) = scheduler.run_until(&derived) else {
        panic!("all_settled should fulfill");
    };

    let fulfilled: Vec<i32> = outcomes
        .iter()
        .filter(|outcome| outcome.is_fulfilled())
        .filter_map(Settled::value)
        .copied()
        .collect();
    assert_eq!(fulfilled, [1, 3]);
}

#[test]
fn test_all_settled_of_nothing_is_already_fulfilled() {
    let scheduler = virtual_scheduler();
    let derived = all_settled(&scheduler, Vec::<Task<i32, String>>::new());

    assert_eq!(derived.settled(), Some(Settled::Fulfilled(Vec::new())));
}

// ============================================================================
// Cancellation forwarding
// ============================================================================

#[test]
fn test_cancelling_derived_task_cancels_pending_children() {
    let scheduler = virtual_scheduler();
    let done = Task::<i32, String>::fulfilled(&scheduler, 0);
    let slow = delay::<i32, String>(&scheduler, ms(10), 1);
    let slower = delay::<i32, String>(&scheduler, ms(20), 2);

    let derived = all(&scheduler, [done.clone(), slow.clone(), slower.clone()]);
    derived.cancel();
    scheduler.run().unwrap();

    assert_eq!(done.status(), Some(Status::Fulfilled));
    assert_eq!(slow.status(), Some(Status::Cancelled));
    assert_eq!(slower.status(), Some(Status::Cancelled));
    assert_eq!(scheduler.pending_timers(), 0);
    assert_eq!(scheduler.now(), Duration::ZERO);
}

#[test]
fn test_decided_combinator_does_not_cancel_losers() {
    let scheduler = virtual_scheduler();
    let loser = delay::<i32, String>(&scheduler, ms(20), 2);

    let winner = race(&scheduler, [delay(&scheduler, ms(10), 1), loser.clone()]);
    scheduler.run().unwrap();

    assert_eq!(winner.settled(), Some(Settled::Fulfilled(1)));
    assert_eq!(loser.settled(), Some(Settled::Fulfilled(2)));
}

#[test]
fn test_externally_settled_derived_task_releases_children() {
    let scheduler = virtual_scheduler();
    let marker = Rc::new(());

    let done = Task::<Rc<()>, String>::fulfilled(&scheduler, Rc::clone(&marker));
    let never = Task::<Rc<()>, String>::new(&scheduler);

    let derived = all(&scheduler, [done.clone(), never.clone()]);
    scheduler.run().unwrap();
    assert!(derived.is_pending());

    assert!(derived.fulfill(Vec::new()));
    scheduler.run().unwrap();

    drop(derived);
    drop(done);

    assert!(never.is_pending());
    assert_eq!(Rc::strong_count(&marker), 1);
}
