use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

/// Which time source drives a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClockKind {
    /// Real monotonic time. Waiting for a timer sleeps the thread.
    #[default]
    Monotonic,

    /// Virtual time starting at zero. Waiting for a timer jumps the clock
    /// straight to its deadline, which keeps timer-heavy tests instant and
    /// deterministic.
    Virtual,
}

/// Time source of a scheduler.
///
/// All instants are expressed as a [`Duration`] since the scheduler was
/// created, so timer deadlines never depend on wall-clock time.
pub(crate) enum Clock {
    Monotonic { origin: Instant },
    Virtual { now: Cell<Duration> },
}

impl Clock {
    pub(crate) fn new(kind: ClockKind) -> Self {
        match kind {
            ClockKind::Monotonic => Clock::Monotonic {
                origin: Instant::now(),
            },
            ClockKind::Virtual => Clock::Virtual {
                now: Cell::new(Duration::ZERO),
            },
        }
    }

    pub(crate) fn kind(&self) -> ClockKind {
        match self {
            Clock::Monotonic { .. } => ClockKind::Monotonic,
            Clock::Virtual { .. } => ClockKind::Virtual,
        }
    }

    /// Current time since the scheduler origin.
    pub(crate) fn now(&self) -> Duration {
        match self {
            Clock::Monotonic { origin } => origin.elapsed(),
            Clock::Virtual { now } => now.get(),
        }
    }

    /// Blocks (or jumps) until `deadline` is reached.
    ///
    /// Virtual time never moves backwards.
    pub(crate) fn wait_until(&self, deadline: Duration) {
        match self {
            Clock::Monotonic { origin } => {
                let elapsed = origin.elapsed();
                if deadline > elapsed {
                    thread::sleep(deadline - elapsed);
                }
            }
            Clock::Virtual { now } => {
                if deadline > now.get() {
                    now.set(deadline);
                }
            }
        }
    }
}
