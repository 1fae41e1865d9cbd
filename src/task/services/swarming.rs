//! Applies execution backend reports to stored tasks.

use super::retry::update_task_with_retries;
use crate::task::{
    domain::{SWARMING_TAG_ID, SwarmingError, SwarmingTaskResult, Task, TaskId},
    ports::{TaskStore, TaskStoreError},
};
use thiserror::Error;
use tracing::debug;

/// Errors raised while syncing a backend report into the store.
#[derive(Debug, Clone, Error)]
pub enum SwarmingSyncError {
    /// The report is malformed or contradicts the stored task.
    #[error(transparent)]
    Swarming(#[from] SwarmingError),

    /// The store rejected the read or write.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Outcome of one reconciliation attempt inside the retry loop.
enum Reconcile {
    Unchanged,
    Failed(SwarmingSyncError),
}

impl From<TaskStoreError> for Reconcile {
    fn from(err: TaskStoreError) -> Self {
        Self::Failed(err.into())
    }
}

/// Reconciles the task named by the report's `sk_id` tag with the report.
///
/// Returns `Ok(false)` without writing when the report carries nothing new.
///
/// # Errors
///
/// Returns [`SwarmingSyncError::Swarming`] for a report without an `sk_id`
/// tag or one that contradicts the task's identity, and
/// [`SwarmingSyncError::Store`] when the task is missing or the write keeps
/// conflicting.
pub async fn update_store_from_swarming_task<S>(
    store: &S,
    report: &SwarmingTaskResult,
) -> Result<bool, SwarmingSyncError>
where
    S: TaskStore + ?Sized,
{
    let id = TaskId::new(report.tag_value(SWARMING_TAG_ID)?);
    let outcome = update_task_with_retries(store, &id, async |task: &mut Task| {
        match task.update_from_swarming(report) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Reconcile::Unchanged),
            Err(err) => Err(Reconcile::Failed(err.into())),
        }
    })
    .await;
    match outcome {
        Ok(_) => {
            debug!(task_id = %id, backend_task = %report.task_id, "applied backend report");
            Ok(true)
        }
        Err(Reconcile::Unchanged) => Ok(false),
        Err(Reconcile::Failed(err)) => Err(err),
    }
}
