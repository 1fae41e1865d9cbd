//! Execution backend ("Swarming") reports and their reconciliation into
//! tasks.

use super::{SwarmingError, Task, TaskId, TaskStatus};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag marking a backend job as viewable in the build UI.
pub const SWARMING_TAG_ALLOW_MILO: &str = "allow_milo";
/// Tag carrying the task identifier.
pub const SWARMING_TAG_ID: &str = "sk_id";
/// Tag carrying the task name.
pub const SWARMING_TAG_NAME: &str = "sk_name";
/// Tag carrying one parent task identifier; repeated per parent.
pub const SWARMING_TAG_PARENT_TASK_ID: &str = "sk_parent_task_id";
/// Tag carrying the scheduling priority.
pub const SWARMING_TAG_PRIORITY: &str = "sk_priority";
/// Tag carrying the repository.
pub const SWARMING_TAG_REPO: &str = "sk_repo";
/// Tag carrying the identifier of the retried task.
pub const SWARMING_TAG_RETRY_OF: &str = "sk_retry_of";
/// Tag carrying the revision.
pub const SWARMING_TAG_REVISION: &str = "sk_revision";
/// Prefix of tags mirroring the job's bot dimensions.
pub const SWARMING_TAG_DIMENSION_PREFIX: &str = "sk_dim_";

/// Layout of backend timestamps, always UTC without an offset.
const SWARMING_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Job state reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwarmingState {
    /// The bot died while running the job.
    BotDied,
    /// The job was cancelled.
    Canceled,
    /// The job ran to completion, successfully or not.
    Completed,
    /// The job expired waiting for a bot.
    Expired,
    /// The job is queued.
    Pending,
    /// The job is running.
    Running,
    /// The job exceeded its deadline.
    TimedOut,
}

impl SwarmingState {
    /// Maps the backend state onto a task status.
    #[must_use]
    pub const fn task_status(self, failure: bool) -> TaskStatus {
        match self {
            Self::BotDied | Self::Canceled | Self::Expired | Self::TimedOut => TaskStatus::Mishap,
            Self::Pending => TaskStatus::Pending,
            Self::Running => TaskStatus::Running,
            Self::Completed if failure => TaskStatus::Failure,
            Self::Completed => TaskStatus::Success,
        }
    }
}

impl TryFrom<&str> for SwarmingState {
    type Error = SwarmingError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "BOT_DIED" => Ok(Self::BotDied),
            "CANCELED" => Ok(Self::Canceled),
            "COMPLETED" => Ok(Self::Completed),
            "EXPIRED" => Ok(Self::Expired),
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "TIMED_OUT" => Ok(Self::TimedOut),
            _ => Err(SwarmingError::UnknownState(value.to_owned())),
        }
    }
}

/// Reference to the isolated outputs of a finished job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputsRef {
    /// Isolated hash of the outputs.
    pub isolated: String,
    /// Isolate server holding the outputs.
    pub isolatedserver: Option<String>,
    /// Isolate namespace of the outputs.
    pub namespace: Option<String>,
}

/// Result of a backend job, in the backend's wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmingTaskResult {
    /// Backend job identifier.
    pub task_id: String,
    /// Raw job state, see [`SwarmingState`].
    pub state: String,
    /// Whether a completed job failed.
    pub failure: bool,
    /// Creation timestamp; always present for real jobs.
    pub created_ts: Option<String>,
    /// Start timestamp, once a bot picked the job up.
    pub started_ts: Option<String>,
    /// Completion timestamp.
    pub completed_ts: Option<String>,
    /// Time the job was abandoned without completing.
    pub abandoned_ts: Option<String>,
    /// Outputs of a completed job.
    pub outputs_ref: Option<OutputsRef>,
    /// Tags in `key:value` form.
    pub tags: Vec<String>,
}

impl SwarmingTaskResult {
    /// Parses the report's tags.
    ///
    /// # Errors
    ///
    /// Returns [`SwarmingError::MalformedTag`] for a tag without `:`.
    pub fn tag_values(&self) -> Result<SwarmingTags, SwarmingError> {
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for tag in &self.tags {
            let (key, value) = tag
                .split_once(':')
                .ok_or_else(|| SwarmingError::MalformedTag(tag.clone()))?;
            values
                .entry(key.to_owned())
                .or_default()
                .push(value.to_owned());
        }
        Ok(SwarmingTags(values))
    }

    /// Returns the first value of a required tag.
    ///
    /// # Errors
    ///
    /// Returns [`SwarmingError::MissingTag`] when the tag is absent, or the
    /// tag parsing error.
    pub fn tag_value(&self, tag: &'static str) -> Result<String, SwarmingError> {
        self.tag_values()?
            .first(tag)
            .map(ToOwned::to_owned)
            .ok_or_else(|| SwarmingError::MissingTag {
                tag,
                backend_task: self.task_id.clone(),
            })
    }
}

/// Parsed tags of a backend report; keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwarmingTags(BTreeMap<String, Vec<String>>);

impl SwarmingTags {
    /// Returns the first value recorded for `key`.
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value recorded for `key`.
    #[must_use]
    pub fn all(&self, key: &str) -> &[String] {
        self.0.get(key).map_or(&[], Vec::as_slice)
    }
}

/// Parses a backend timestamp.
///
/// Backend timestamps carry no offset and are in UTC; RFC 3339 values with
/// an explicit offset are accepted as well.
///
/// # Errors
///
/// Returns [`SwarmingError::InvalidTimestamp`] when `value` matches neither
/// layout.
pub fn parse_swarming_timestamp(
    field: &'static str,
    value: &str,
    task: &str,
) -> Result<DateTime<Utc>, SwarmingError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, SWARMING_TIMESTAMP_FORMAT)
                .map(|naive| naive.and_utc())
        })
        .map_err(|_| SwarmingError::InvalidTimestamp {
            field,
            value: value.to_owned(),
            task: task.to_owned(),
        })
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|raw| !raw.is_empty())
}

impl Task {
    /// Sets or checks this task's fields from a backend report.
    ///
    /// Identity fields (id, name, repo, retry-of, revision, creation time and
    /// backend job id) are filled in when empty and must match when set.
    /// Parent ids, status, isolated output and the run timestamps are
    /// recomputed from the report on every call. The task is left untouched
    /// on error.
    ///
    /// Returns `true` when any field changed.
    ///
    /// # Errors
    ///
    /// Returns a [`SwarmingError`] for malformed tags, identity mismatches,
    /// unparseable timestamps, and unknown states.
    pub fn update_from_swarming(
        &mut self,
        report: &SwarmingTaskResult,
    ) -> Result<bool, SwarmingError> {
        let tags = report.tag_values()?;
        let task_label = self.display_id();
        let mut updated = self.clone();

        reconcile_id(&mut updated.id, tags.first(SWARMING_TAG_ID), "Id", &task_label)?;
        reconcile_text(
            &mut updated.name,
            tags.first(SWARMING_TAG_NAME),
            "Name",
            &task_label,
        )?;
        reconcile_text(
            &mut updated.repo,
            tags.first(SWARMING_TAG_REPO),
            "Repo",
            &task_label,
        )?;
        reconcile_id(
            &mut updated.retry_of,
            tags.first(SWARMING_TAG_RETRY_OF),
            "RetryOf",
            &task_label,
        )?;
        reconcile_text(
            &mut updated.revision,
            tags.first(SWARMING_TAG_REVISION),
            "Revision",
            &task_label,
        )?;

        let mut parent_task_ids: Vec<TaskId> = tags
            .all(SWARMING_TAG_PARENT_TASK_ID)
            .iter()
            .map(|id| TaskId::new(id.as_str()))
            .collect();
        parent_task_ids.sort();
        updated.parent_task_ids = parent_task_ids;

        let created = parse_swarming_timestamp(
            "created_ts",
            report.created_ts.as_deref().unwrap_or_default(),
            &task_label,
        )?;
        match updated.created {
            None => updated.created = Some(created),
            Some(recorded) if recorded == created => {}
            Some(recorded) => {
                return Err(SwarmingError::CreationTimeChanged {
                    task: task_label,
                    was: recorded.to_rfc3339(),
                    now: created.to_rfc3339(),
                });
            }
        }

        match updated.swarming_task_id.as_deref() {
            None if report.task_id.is_empty() => {}
            None => updated.swarming_task_id = Some(report.task_id.clone()),
            Some(recorded) if recorded == report.task_id => {}
            Some(recorded) => {
                return Err(SwarmingError::IdentityMismatch {
                    field: "SwarmingTaskId",
                    task: task_label,
                    was: recorded.to_owned(),
                    now: report.task_id.clone(),
                });
            }
        }

        updated.status = SwarmingState::try_from(report.state.as_str())?.task_status(report.failure);

        updated.isolated_output = report
            .outputs_ref
            .as_ref()
            .map(|outputs| outputs.isolated.clone())
            .filter(|isolated| !isolated.is_empty());

        if let Some(raw) = non_empty(report.started_ts.as_ref()) {
            updated.started = Some(parse_swarming_timestamp("started_ts", raw, &task_label)?);
        }
        if let Some(raw) = non_empty(report.completed_ts.as_ref()) {
            updated.finished = Some(parse_swarming_timestamp("completed_ts", raw, &task_label)?);
        } else if updated.status == TaskStatus::Mishap {
            if let Some(raw) = non_empty(report.abandoned_ts.as_ref()) {
                updated.finished =
                    Some(parse_swarming_timestamp("abandoned_ts", raw, &task_label)?);
            }
        }
        if updated.is_done() && updated.started.is_none() {
            updated.started = updated.finished;
        }

        if updated == *self {
            return Ok(false);
        }
        *self = updated;
        Ok(true)
    }
}

fn reconcile_text(
    slot: &mut String,
    reported: Option<&str>,
    field: &'static str,
    task: &str,
) -> Result<(), SwarmingError> {
    let Some(value) = reported else {
        return Ok(());
    };
    if slot.is_empty() {
        value.clone_into(slot);
        return Ok(());
    }
    if slot != value {
        return Err(SwarmingError::IdentityMismatch {
            field,
            task: task.to_owned(),
            was: slot.clone(),
            now: value.to_owned(),
        });
    }
    Ok(())
}

fn reconcile_id(
    slot: &mut Option<TaskId>,
    reported: Option<&str>,
    field: &'static str,
    task: &str,
) -> Result<(), SwarmingError> {
    match (slot.as_ref(), reported) {
        (_, None) => Ok(()),
        (None, Some(value)) => {
            if !value.is_empty() {
                *slot = Some(TaskId::new(value));
            }
            Ok(())
        }
        (Some(recorded), Some(value)) if recorded.as_str() == value => Ok(()),
        (Some(recorded), Some(value)) => Err(SwarmingError::IdentityMismatch {
            field,
            task: task.to_owned(),
            was: recorded.to_string(),
            now: value.to_owned(),
        }),
    }
}
