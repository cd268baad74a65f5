use crate::error::TaskError;

/// Terminal status of a settled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The task produced a value.
    Fulfilled,

    /// The task failed with a reason. A normal, expected outcome.
    Rejected,

    /// The task was stopped before completing. Distinct from rejection.
    Cancelled,
}

/// The outcome a task settled with.
///
/// Once a task leaves the pending state its `Settled` value is fixed and
/// shared by every observer. This is also the per-child record produced by
/// [`all_settled`](crate::combinator::all_settled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    Fulfilled(T),
    Rejected(E),
    Cancelled,
}

impl<T, E> Settled<T, E> {
    pub fn status(&self) -> Status {
        match self {
            Settled::Fulfilled(_) => Status::Fulfilled,
            Settled::Rejected(_) => Status::Rejected,
            Settled::Cancelled => Status::Cancelled,
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled(_))
    }

    /// The fulfilled value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Settled::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<&E> {
        match self {
            Settled::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// Converts the outcome into the `Result` an awaiting future observes.
    pub fn into_result(self) -> Result<T, TaskError<E>> {
        match self {
            Settled::Fulfilled(value) => Ok(value),
            Settled::Rejected(reason) => Err(TaskError::Rejected(reason)),
            Settled::Cancelled => Err(TaskError::Cancelled),
        }
    }
}

impl<T, E> From<Result<T, E>> for Settled<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Settled::Fulfilled(value),
            Err(reason) => Settled::Rejected(reason),
        }
    }
}
