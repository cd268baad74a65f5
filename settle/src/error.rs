//! Error types.
//!
//! Rejection and cancellation are ordinary task outcomes, not errors of the
//! engine. The types here only describe how those outcomes surface once a
//! task is awaited, and the ways a run of the event loop can stop early.

use thiserror::Error;

/// Why an awaited task produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError<E> {
    /// The task was rejected with this reason.
    #[error("task rejected: {0}")]
    Rejected(E),

    /// The task was cancelled before it completed.
    #[error("task cancelled")]
    Cancelled,
}

impl<E> TaskError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    /// The rejection reason, if the task was rejected.
    pub fn into_reason(self) -> Option<E> {
        match self {
            TaskError::Rejected(reason) => Some(reason),
            TaskError::Cancelled => None,
        }
    }
}

/// Failure of [`any`](crate::combinator::any): every child was rejected.
///
/// `reasons` holds one rejection reason per child, in child order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all {} tasks were rejected", .reasons.len())]
pub struct AggregateError<E> {
    pub reasons: Vec<E>,
}

/// Ways a run of the event loop can end without reaching its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RunError {
    /// The loop went idle while the awaited task or future was still
    /// pending; nothing left could ever settle it.
    #[error("scheduler went idle before the awaited work settled")]
    Stalled,

    /// The configured tick limit was reached.
    #[error("tick limit of {limit} reached")]
    TickLimit { limit: u64 },

    /// The scheduler was shut down.
    #[error("scheduler is shut down")]
    Closed,
}
