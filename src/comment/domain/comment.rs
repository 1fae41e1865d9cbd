//! Comment records attached to tasks, task specs and commits.

use crate::task::domain::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment on a task at a particular commit.
///
/// Identified by `(repo, name, commit, timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskComment {
    /// Repository of the commented commit.
    pub repo: String,
    /// Task name.
    pub name: String,
    /// Commented commit.
    pub commit: String,
    /// Time the comment was made.
    pub timestamp: DateTime<Utc>,
    /// Task the comment refers to, if any.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Author.
    pub user: String,
    /// Comment text.
    pub message: String,
}

/// Comment on every task generated from a spec.
///
/// Identified by `(repo, name, timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpecComment {
    /// Repository defining the spec.
    pub repo: String,
    /// Task spec name.
    pub name: String,
    /// Time the comment was made.
    pub timestamp: DateTime<Utc>,
    /// Author.
    pub user: String,
    /// The spec is known to be flaky.
    #[serde(default)]
    pub flaky: bool,
    /// Failures of the spec should not block anything.
    #[serde(default)]
    pub ignore_failure: bool,
    /// Comment text.
    pub message: String,
}

/// Comment on a commit.
///
/// Identified by `(repo, commit, timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitComment {
    /// Repository of the commit.
    pub repo: String,
    /// Commented commit.
    pub commit: String,
    /// Time the comment was made.
    pub timestamp: DateTime<Utc>,
    /// Author.
    pub user: String,
    /// Comment text.
    pub message: String,
}

/// Comment kinds stored in timestamp-ordered groups.
pub(super) trait Timestamped: PartialEq {
    fn timestamp(&self) -> DateTime<Utc>;

    /// Identity string for conflict reports.
    fn identity(&self) -> String;
}

impl Timestamped for TaskComment {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn identity(&self) -> String {
        format!(
            "task comment {}/{}/{} at {}",
            self.repo,
            self.name,
            self.commit,
            self.timestamp.to_rfc3339()
        )
    }
}

impl Timestamped for TaskSpecComment {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn identity(&self) -> String {
        format!(
            "task spec comment {}/{} at {}",
            self.repo,
            self.name,
            self.timestamp.to_rfc3339()
        )
    }
}

impl Timestamped for CommitComment {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn identity(&self) -> String {
        format!(
            "commit comment {}/{} at {}",
            self.repo,
            self.commit,
            self.timestamp.to_rfc3339()
        )
    }
}
