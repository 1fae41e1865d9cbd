//! Error types for task validation, parsing, and backend reconciliation.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned when a task is not fit to be written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskValidationError {
    /// The task has no creation timestamp.
    #[error("Created not set for task {0}")]
    MissingCreated(String),

    /// The task finished before it started.
    #[error("task {0} finished before it started")]
    FinishedBeforeStarted(String),

    /// The status would move backwards or leave a terminal state.
    #[error("invalid status transition for task {task}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Task being written.
        task: TaskId,
        /// Currently persisted status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

/// Errors raised while merging an execution backend report into a task.
///
/// None of these are retryable: they point at corrupt upstream data or a
/// caller bug.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwarmingError {
    /// A tag is not in `key:value` form.
    #[error("malformed tag {0:?}, expected key:value")]
    MalformedTag(String),

    /// A required tag is absent from the report.
    #[error("report for backend task {backend_task:?} has no {tag} tag")]
    MissingTag {
        /// Tag key looked up.
        tag: &'static str,
        /// Backend task identifier of the report.
        backend_task: String,
    },

    /// An identity field disagrees with the value already recorded.
    #[error("{field} does not match for task {task}. Was {was}, now {now}")]
    IdentityMismatch {
        /// Name of the mismatching field.
        field: &'static str,
        /// Task being reconciled.
        task: String,
        /// Value already on the task.
        was: String,
        /// Value reported by the backend.
        now: String,
    },

    /// The backend reports a different creation time than recorded.
    #[error("creation time has changed for task {task}. Was {was}, now {now}")]
    CreationTimeChanged {
        /// Task being reconciled.
        task: String,
        /// Recorded creation time.
        was: String,
        /// Reported creation time.
        now: String,
    },

    /// A backend timestamp could not be parsed.
    #[error("unable to parse {field} {value:?} for task {task}")]
    InvalidTimestamp {
        /// Report field that failed to parse.
        field: &'static str,
        /// Raw value.
        value: String,
        /// Task being reconciled.
        task: String,
    },

    /// The backend state is not one this crate understands.
    #[error("unknown swarming state {0:?}")]
    UnknownState(String),
}
