use super::clock::ClockKind;
use super::core::Scheduler;

/// Resolved scheduler settings.
pub(crate) struct Config {
    pub(crate) clock: ClockKind,
    pub(crate) max_ticks: Option<u64>,
    pub(crate) name: String,
}

/// Builder for configuring and creating a scheduler.
///
/// # Examples
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new()
///     .virtual_time()
///     .max_ticks(10_000)
///     .build();
/// ```
pub struct SchedulerBuilder {
    clock: ClockKind,

    /// Upper bound on ticks for a single `run`, `run_until` or `block_on`.
    max_ticks: Option<u64>,

    /// Name recorded on the scheduler's tracing span.
    name: String,
}

impl SchedulerBuilder {
    /// Creates a builder with the default configuration: monotonic clock,
    /// no tick limit, named `settle`.
    pub fn new() -> Self {
        Self {
            clock: ClockKind::Monotonic,
            max_ticks: None,
            name: String::from("settle"),
        }
    }

    /// Selects the time source.
    pub fn clock(mut self, clock: ClockKind) -> Self {
        self.clock = clock;
        self
    }

    /// Shorthand for `.clock(ClockKind::Virtual)`.
    pub fn virtual_time(self) -> Self {
        self.clock(ClockKind::Virtual)
    }

    /// Caps the number of ticks a single run may take.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn max_ticks(mut self, n: u64) -> Self {
        assert!(n > 0, "max_ticks must be > 0");

        self.max_ticks = Some(n);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builds the scheduler with the configured options.
    pub fn build(self) -> Scheduler {
        Scheduler::from_config(Config {
            clock: self.clock,
            max_ticks: self.max_ticks,
            name: self.name,
        })
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
