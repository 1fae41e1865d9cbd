//! Tags attached to backend job requests.

use super::{
    SWARMING_TAG_ALLOW_MILO, SWARMING_TAG_DIMENSION_PREFIX, SWARMING_TAG_ID, SWARMING_TAG_NAME,
    SWARMING_TAG_PARENT_TASK_ID, SWARMING_TAG_PRIORITY, SWARMING_TAG_REPO, SWARMING_TAG_RETRY_OF,
    SWARMING_TAG_REVISION, TaskId,
};
use std::collections::BTreeMap;
use tracing::warn;

/// Parameter object describing the job a task is about to trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTags {
    /// Task name.
    pub name: String,
    /// Task identifier.
    pub id: TaskId,
    /// Scheduling priority.
    pub priority: f64,
    /// Repository of the tested commit.
    pub repo: String,
    /// Task being retried, if any.
    pub retry_of: Option<TaskId>,
    /// Tested revision.
    pub revision: String,
    /// Bot dimensions as `(key, value)` pairs.
    pub dimensions: Vec<(String, String)>,
    /// Tasks whose outputs feed this one.
    pub parent_task_ids: Vec<TaskId>,
}

/// Returns the tags to set on the backend job for a task.
///
/// Single-valued tags come first, sorted by key, followed by one
/// `sk_parent_task_id` tag per parent in the given order. The first value
/// wins for a repeated dimension key.
#[must_use]
pub fn tags_for_task(request: &TaskTags) -> Vec<String> {
    let mut tags: BTreeMap<String, String> = BTreeMap::from([
        (SWARMING_TAG_ALLOW_MILO.to_owned(), "1".to_owned()),
        (SWARMING_TAG_NAME.to_owned(), request.name.clone()),
        (SWARMING_TAG_ID.to_owned(), request.id.to_string()),
        (
            SWARMING_TAG_PRIORITY.to_owned(),
            format!("{:.6}", request.priority),
        ),
        (SWARMING_TAG_REPO.to_owned(), request.repo.clone()),
        (
            SWARMING_TAG_RETRY_OF.to_owned(),
            request
                .retry_of
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        ),
        (SWARMING_TAG_REVISION.to_owned(), request.revision.clone()),
    ]);

    for (key, value) in &request.dimensions {
        let tag_key = format!("{SWARMING_TAG_DIMENSION_PREFIX}{key}");
        if tags.contains_key(&tag_key) {
            warn!(dimension = %key, "duplicate dimension/tag");
            continue;
        }
        tags.insert(tag_key, value.clone());
    }

    tags.into_iter()
        .map(|(key, value)| format!("{key}:{value}"))
        .chain(
            request
                .parent_task_ids
                .iter()
                .map(|id| format!("{SWARMING_TAG_PARENT_TASK_ID}:{id}")),
        )
        .collect()
}
