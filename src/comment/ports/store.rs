//! Store port for comments.

use crate::comment::domain::{
    CommentConflict, CommitComment, RepoComments, TaskComment, TaskSpecComment,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for comment store operations.
pub type CommentStoreResult<T> = Result<T, CommentStoreError>;

/// Comment persistence contract.
///
/// Putting a comment identical to a stored one succeeds without effect.
/// Deleting matches on identity fields only and succeeds when nothing
/// matches.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Stores a task comment.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::AlreadyExists`] when a different comment
    /// with the same identity is stored.
    async fn put_task_comment(&self, comment: &TaskComment) -> CommentStoreResult<()>;

    /// Deletes a task comment.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::Persistence`] when the change cannot be
    /// persisted.
    async fn delete_task_comment(&self, comment: &TaskComment) -> CommentStoreResult<()>;

    /// Stores a task spec comment.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::AlreadyExists`] when a different comment
    /// with the same identity is stored.
    async fn put_task_spec_comment(&self, comment: &TaskSpecComment) -> CommentStoreResult<()>;

    /// Deletes a task spec comment.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::Persistence`] when the change cannot be
    /// persisted.
    async fn delete_task_spec_comment(&self, comment: &TaskSpecComment)
    -> CommentStoreResult<()>;

    /// Stores a commit comment.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::AlreadyExists`] when a different comment
    /// with the same identity is stored.
    async fn put_commit_comment(&self, comment: &CommitComment) -> CommentStoreResult<()>;

    /// Deletes a commit comment.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::Persistence`] when the change cannot be
    /// persisted.
    async fn delete_commit_comment(&self, comment: &CommitComment) -> CommentStoreResult<()>;

    /// Returns one aggregate per requested repository, in request order.
    ///
    /// Unknown repositories yield an empty aggregate. Comments older than
    /// `from` may be left out; newer ones are always included.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::Persistence`] when the store cannot be
    /// read.
    async fn get_comments_for_repos(
        &self,
        repos: &[String],
        from: DateTime<Utc>,
    ) -> CommentStoreResult<Vec<RepoComments>>;
}

/// Errors returned by comment store implementations.
#[derive(Debug, Clone, Error)]
pub enum CommentStoreError {
    /// A different comment with the same identity exists.
    #[error("{0}")]
    AlreadyExists(#[from] CommentConflict),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CommentStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }

    /// Returns `true` for [`CommentStoreError::AlreadyExists`].
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}
