#![allow(dead_code)]
//! Shared integration test utilities.

use settle::Scheduler;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Routes `tracing` output to the test harness. Safe to call from every
/// test.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("settle=trace")),
            )
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// A scheduler on virtual time, with logging initialised.
pub fn virtual_scheduler() -> Scheduler {
    init_test_logging();
    Scheduler::builder().virtual_time().name("test").build()
}

/// Ordered record of events, shareable with callbacks.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// A callback that records `event` when run.
    pub fn recorder(&self, event: &'static str) -> impl FnOnce() + 'static {
        let journal = self.clone();
        move || journal.push(event)
    }
}
