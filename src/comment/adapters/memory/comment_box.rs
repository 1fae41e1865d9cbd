//! In-memory comment store with optional write-through persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::comment::{
    domain::{CommentConflict, CommitComment, RepoComments, TaskComment, TaskSpecComment},
    ports::{CommentStore, CommentStoreError, CommentStoreResult},
};

/// Comments of every repository, keyed by repository.
pub type RepoCommentMap = BTreeMap<String, RepoComments>;

/// Persists the full comment map after a change.
pub type CommentWriter = Arc<dyn Fn(&RepoCommentMap) -> CommentStoreResult<()> + Send + Sync>;

/// Thread-safe in-memory comment store.
///
/// With a writer attached, every change is applied to a copy of the map and
/// handed to the writer; the copy replaces the live map only when the writer
/// succeeds. Rejected and no-op changes never reach the writer.
#[derive(Clone, Default)]
pub struct CommentBox {
    state: Arc<RwLock<RepoCommentMap>>,
    writer: Option<CommentWriter>,
}

impl fmt::Debug for CommentBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommentBox")
            .field("persistent", &self.writer.is_some())
            .finish_non_exhaustive()
    }
}

impl CommentBox {
    /// Creates an empty, non-persistent store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `initial` that reports every change to
    /// `writer`.
    #[must_use]
    pub fn with_persistence(initial: RepoCommentMap, writer: CommentWriter) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
            writer: Some(writer),
        }
    }

    /// Applies `change` and persists the result.
    fn modify<F>(&self, change: F) -> CommentStoreResult<()>
    where
        F: FnOnce(&mut RepoCommentMap) -> Result<bool, CommentConflict>,
    {
        let mut state = self.state.write().map_err(|err| {
            CommentStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let Some(writer) = self.writer.as_ref() else {
            change(&mut state)?;
            return Ok(());
        };
        let mut staged = state.clone();
        if change(&mut staged)? {
            writer(&staged)?;
            *state = staged;
        }
        Ok(())
    }
}

/// Returns the aggregate for `repo`, creating it when missing.
fn repo_entry<'a>(comments: &'a mut RepoCommentMap, repo: &str) -> &'a mut RepoComments {
    comments
        .entry(repo.to_owned())
        .or_insert_with(|| RepoComments::new(repo))
}

#[async_trait]
impl CommentStore for CommentBox {
    async fn put_task_comment(&self, comment: &TaskComment) -> CommentStoreResult<()> {
        self.modify(|comments| {
            repo_entry(comments, &comment.repo).add_task_comment(comment.clone())
        })
    }

    async fn delete_task_comment(&self, comment: &TaskComment) -> CommentStoreResult<()> {
        self.modify(|comments| {
            Ok(comments
                .get_mut(&comment.repo)
                .is_some_and(|repo| repo.remove_task_comment(comment)))
        })
    }

    async fn put_task_spec_comment(&self, comment: &TaskSpecComment) -> CommentStoreResult<()> {
        self.modify(|comments| {
            repo_entry(comments, &comment.repo).add_task_spec_comment(comment.clone())
        })
    }

    async fn delete_task_spec_comment(
        &self,
        comment: &TaskSpecComment,
    ) -> CommentStoreResult<()> {
        self.modify(|comments| {
            Ok(comments
                .get_mut(&comment.repo)
                .is_some_and(|repo| repo.remove_task_spec_comment(comment)))
        })
    }

    async fn put_commit_comment(&self, comment: &CommitComment) -> CommentStoreResult<()> {
        self.modify(|comments| {
            repo_entry(comments, &comment.repo).add_commit_comment(comment.clone())
        })
    }

    async fn delete_commit_comment(&self, comment: &CommitComment) -> CommentStoreResult<()> {
        self.modify(|comments| {
            Ok(comments
                .get_mut(&comment.repo)
                .is_some_and(|repo| repo.remove_commit_comment(comment)))
        })
    }

    async fn get_comments_for_repos(
        &self,
        repos: &[String],
        from: DateTime<Utc>,
    ) -> CommentStoreResult<Vec<RepoComments>> {
        let state = self.state.read().map_err(|err| {
            CommentStoreError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let result: Vec<RepoComments> = repos
            .iter()
            .map(|repo| {
                state
                    .get(repo)
                    .map_or_else(|| RepoComments::new(repo.as_str()), |found| found.since(from))
            })
            .collect();
        debug!(repos = repos.len(), "read comments");
        Ok(result)
    }
}
