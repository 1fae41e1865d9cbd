//! Task record and lifecycle status.

use super::{ParseTaskStatusError, TaskId, TaskValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Task lifecycle status.
///
/// Statuses only move forward: `Pending` to `Running` to one of the terminal
/// states. Re-running a finished task means creating a new task whose
/// `retry_of` points at the old one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// The task has not started.
    #[default]
    Pending,
    /// The task is in progress.
    Running,
    /// The task completed successfully.
    Success,
    /// The task completed with failures.
    Failure,
    /// The task exited early with an error, died while in progress, was
    /// cancelled, expired while waiting on the queue, or timed out.
    Mishap,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Mishap => "MISHAP",
        }
    }

    /// Returns `true` for terminal statuses.
    #[must_use]
    pub const fn is_done(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Returns `true` when a stored task in this status may be rewritten with
    /// `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => true,
            Self::Running => next == Self::Running || next.is_done(),
            done => done == next,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "MISHAP" => Ok(Self::Mishap),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// One unit of work, optionally backed by an execution backend job.
///
/// Tasks without a backend job are synthetic records that are displayed as
/// if they had run.
///
/// The serialised form must stay backward compatible: new fields need a
/// meaningful default, existing fields never change type or meaning, and
/// names of removed fields are never reused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    /// Unique identifier, empty until assigned by the store.
    pub id: Option<TaskId>,
    /// Human-friendly name shared by every task generated from one spec.
    pub name: String,
    /// Repository of the commit the task ran at.
    pub repo: String,
    /// Commit the task ran at.
    pub revision: String,
    /// Commits covered by this task. May change through backfill or
    /// bisection.
    pub commits: Vec<String>,
    /// Tasks that satisfied this task's dependencies.
    pub parent_task_ids: Vec<TaskId>,
    /// Task this one retries, if any.
    pub retry_of: Option<TaskId>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Creation time. Required before the task is first written.
    pub created: Option<DateTime<Utc>>,
    /// Start time, or the finish time when the task never ran.
    pub started: Option<DateTime<Utc>>,
    /// Time the task stopped running or expired from the queue.
    pub finished: Option<DateTime<Utc>>,
    /// Version stamp of the last successful write. Set by the store only.
    pub db_modified: Option<DateTime<Utc>>,
    /// Backend job identifier, for tasks that ran on the backend.
    pub swarming_task_id: Option<String>,
    /// Isolated hash of the outputs of a completed backend job.
    pub isolated_output: Option<String>,
}

impl Task {
    /// Creates an unsaved task.
    #[must_use]
    pub fn new(name: impl Into<String>, repo: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
            created: Some(created),
            ..Self::default()
        }
    }

    /// Sets the tested revision.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Sets the covered commits.
    #[must_use]
    pub fn with_commits<I, S>(mut self, commits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commits = commits.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the task as a retry of `original`.
    #[must_use]
    pub fn with_retry_of(mut self, original: TaskId) -> Self {
        self.retry_of = Some(original);
        self
    }

    /// Returns `true` once the task reached a terminal status.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.status.is_done()
    }

    /// Returns `true` when the task finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }

    /// Returns the identifier for log and error output.
    #[must_use]
    pub fn display_id(&self) -> String {
        self.id
            .as_ref()
            .map_or_else(|| "<unassigned>".to_owned(), ToString::to_string)
    }

    /// Checks the invariants every written task must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`TaskValidationError::MissingCreated`] when `created` is
    /// unset and [`TaskValidationError::FinishedBeforeStarted`] when both
    /// timestamps are set and out of order.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.created.is_none() {
            return Err(TaskValidationError::MissingCreated(self.display_id()));
        }
        match (self.started, self.finished) {
            (Some(started), Some(finished)) if finished < started => Err(
                TaskValidationError::FinishedBeforeStarted(self.display_id()),
            ),
            _ => Ok(()),
        }
    }

    /// Orders tasks by creation time; unset creation times sort first.
    #[must_use]
    pub fn cmp_by_created(&self, other: &Self) -> Ordering {
        self.created.cmp(&other.created)
    }
}

/// Sorts tasks by creation time, keeping insertion order for ties.
pub fn sort_by_created(tasks: &mut [Task]) {
    tasks.sort_by(Task::cmp_by_created);
}
