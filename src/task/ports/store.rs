//! Store port for task persistence, versioning, and change tracking.

use crate::task::domain::{Task, TaskId, TaskValidationError, TrackingId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Task persistence contract with optimistic concurrency.
///
/// Every successful write stamps the written tasks with a new
/// [`Task::db_modified`] value. A write whose cached stamp differs from the
/// stored one fails with [`TaskStoreError::ConcurrentUpdate`] and leaves the
/// store untouched. Reads hand out detached copies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Reserves a fresh, URL-safe identifier for an unsaved task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::IdAlreadyAssigned`] when the task already
    /// has an identifier.
    async fn assign_id(&self, task: &mut Task) -> TaskStoreResult<()>;

    /// Inserts or updates a single task.
    ///
    /// # Errors
    ///
    /// See [`TaskStore::put_tasks`].
    async fn put_task(&self, task: &mut Task) -> TaskStoreResult<()> {
        self.put_tasks(std::slice::from_mut(task)).await
    }

    /// Inserts or updates tasks atomically.
    ///
    /// Tasks without an identifier are assigned one. On success every task
    /// carries its new identifier and version stamp; on failure nothing is
    /// written and the given tasks are left as they were.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Validation`] when a task fails validation
    /// and [`TaskStoreError::ConcurrentUpdate`] when any task's version stamp
    /// is stale.
    async fn put_tasks(&self, tasks: &mut [Task]) -> TaskStoreResult<()>;

    /// Returns the stored task, or `None` when it does not exist.
    async fn get_task_by_id(&self, id: &TaskId) -> TaskStoreResult<Option<Task>>;

    /// Returns tasks created in `[start, end)`, oldest first, ties in
    /// insertion order.
    async fn get_tasks_from_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TaskStoreResult<Vec<Task>>;

    /// Registers a cursor over subsequently modified tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::TooManyUsers`] when the cursor table is
    /// full.
    async fn start_tracking_modified_tasks(&self) -> TaskStoreResult<TrackingId>;

    /// Returns and clears the tasks written since the cursor's last poll.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::UnknownId`] for an unregistered or
    /// reclaimed cursor.
    async fn get_modified_tasks(&self, id: &TrackingId) -> TaskStoreResult<Vec<Task>>;

    /// Releases a cursor.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::UnknownId`] for an unregistered cursor.
    async fn stop_tracking_modified_tasks(&self, id: &TrackingId) -> TaskStoreResult<()>;

    /// Releases underlying resources; later calls fail with
    /// [`TaskStoreError::Closed`].
    async fn close(&self) -> TaskStoreResult<()>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// The cached version stamp of the task is stale.
    #[error("concurrent update of task {0}")]
    ConcurrentUpdate(TaskId),

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The modified-task cursor is not registered.
    #[error("unknown modified-tasks cursor: {0}")]
    UnknownId(TrackingId),

    /// The maximum number of modified-task cursors is registered.
    #[error("too many modified-tasks users (max {max})")]
    TooManyUsers {
        /// Configured cursor ceiling.
        max: usize,
    },

    /// The task already carries an identifier.
    #[error("task already has an id: {0}")]
    IdAlreadyAssigned(TaskId),

    /// The task failed validation.
    #[error(transparent)]
    Validation(#[from] TaskValidationError),

    /// The store was closed.
    #[error("task store is closed")]
    Closed,

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns `true` for errors that a fresh read-modify-write can resolve.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentUpdate(_))
    }
}
