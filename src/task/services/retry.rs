//! Read-modify-write loops with bounded retries on version conflicts.

use crate::task::{
    domain::{Task, TaskId},
    ports::{TaskStore, TaskStoreError},
};
use tracing::{debug, warn};

/// Number of attempts made before a version conflict is surfaced.
pub const NUM_RETRIES: usize = 5;

/// Runs `f` and writes the tasks it returns, retrying the whole cycle on
/// [`TaskStoreError::ConcurrentUpdate`].
///
/// `f` must re-read whatever state it depends on, since each attempt starts
/// from the store's latest version. Errors from `f`, and store errors other
/// than a version conflict, end the loop immediately. A failed batch leaves
/// the store unchanged.
///
/// # Errors
///
/// Returns the error raised by `f`, the first non-retryable store error, or
/// the last conflict once [`NUM_RETRIES`] attempts have failed.
pub async fn update_with_retries<S, F, E>(store: &S, mut f: F) -> Result<Vec<Task>, E>
where
    S: TaskStore + ?Sized,
    F: AsyncFnMut() -> Result<Vec<Task>, E>,
    E: From<TaskStoreError>,
{
    let mut attempt = 1;
    loop {
        let mut tasks = f().await?;
        match store.put_tasks(&mut tasks).await {
            Ok(()) => return Ok(tasks),
            Err(err) => attempt = next_attempt(attempt, err)?,
        }
    }
}

/// Loads one task, applies `f` to it and writes it back, retrying on
/// [`TaskStoreError::ConcurrentUpdate`].
///
/// Returns the task as persisted, carrying its new version stamp.
///
/// # Errors
///
/// Returns [`TaskStoreError::NotFound`] without calling `f` when the task
/// does not exist, otherwise the same errors as [`update_with_retries`].
pub async fn update_task_with_retries<S, F, E>(store: &S, id: &TaskId, mut f: F) -> Result<Task, E>
where
    S: TaskStore + ?Sized,
    F: AsyncFnMut(&mut Task) -> Result<(), E>,
    E: From<TaskStoreError>,
{
    let mut attempt = 1;
    loop {
        let mut task = store
            .get_task_by_id(id)
            .await?
            .ok_or_else(|| TaskStoreError::NotFound(id.clone()))?;
        f(&mut task).await?;
        match store.put_task(&mut task).await {
            Ok(()) => return Ok(task),
            Err(err) => attempt = next_attempt(attempt, err)?,
        }
    }
}

/// Returns the next attempt number, or the error when it is final.
fn next_attempt(attempt: usize, err: TaskStoreError) -> Result<usize, TaskStoreError> {
    if !err.is_retryable() {
        return Err(err);
    }
    if attempt >= NUM_RETRIES {
        warn!(attempts = attempt, error = %err, "giving up after repeated concurrent updates");
        return Err(err);
    }
    debug!(attempt, error = %err, "concurrent update, retrying");
    Ok(attempt + 1)
}
