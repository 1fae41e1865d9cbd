//! Per-repository comment aggregate.

use super::comment::{CommitComment, TaskComment, TaskSpecComment, Timestamped};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A comment with the same identity but different content already exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} already exists with different content")]
pub struct CommentConflict(pub String);

/// Task comments grouped by task name, then commit.
pub type TaskCommentsByName = BTreeMap<String, BTreeMap<String, Vec<TaskComment>>>;

/// All comments of one repository.
///
/// Every group is sorted by timestamp and never empty; removing the last
/// comment of a group removes the group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoComments {
    /// Repository URL or name.
    pub repo: String,
    /// Task comments by task name, then commit.
    pub task_comments: TaskCommentsByName,
    /// Task spec comments by spec name.
    pub task_spec_comments: BTreeMap<String, Vec<TaskSpecComment>>,
    /// Commit comments by commit.
    pub commit_comments: BTreeMap<String, Vec<CommitComment>>,
}

impl RepoComments {
    /// Creates an empty aggregate for `repo`.
    #[must_use]
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when the repository has no comments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.task_comments.is_empty()
            && self.task_spec_comments.is_empty()
            && self.commit_comments.is_empty()
    }

    /// Adds a task comment. Returns `false` when an identical comment is
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns [`CommentConflict`] when a comment with the same identity but
    /// different content exists.
    pub fn add_task_comment(&mut self, comment: TaskComment) -> Result<bool, CommentConflict> {
        let group = self
            .task_comments
            .entry(comment.name.clone())
            .or_default()
            .entry(comment.commit.clone())
            .or_default();
        insert_sorted(group, comment)
    }

    /// Removes the task comment with the same identity. Returns `false` when
    /// there was none.
    pub fn remove_task_comment(&mut self, comment: &TaskComment) -> bool {
        let Some(by_commit) = self.task_comments.get_mut(&comment.name) else {
            return false;
        };
        let removed = remove_from_group(by_commit, &comment.commit, comment.timestamp);
        if by_commit.is_empty() {
            self.task_comments.remove(&comment.name);
        }
        removed
    }

    /// Adds a task spec comment. Returns `false` when an identical comment
    /// is already present.
    ///
    /// # Errors
    ///
    /// Returns [`CommentConflict`] when a comment with the same identity but
    /// different content exists.
    pub fn add_task_spec_comment(
        &mut self,
        comment: TaskSpecComment,
    ) -> Result<bool, CommentConflict> {
        let group = self
            .task_spec_comments
            .entry(comment.name.clone())
            .or_default();
        insert_sorted(group, comment)
    }

    /// Removes the task spec comment with the same identity.
    pub fn remove_task_spec_comment(&mut self, comment: &TaskSpecComment) -> bool {
        remove_from_group(
            &mut self.task_spec_comments,
            &comment.name,
            comment.timestamp,
        )
    }

    /// Adds a commit comment. Returns `false` when an identical comment is
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns [`CommentConflict`] when a comment with the same identity but
    /// different content exists.
    pub fn add_commit_comment(&mut self, comment: CommitComment) -> Result<bool, CommentConflict> {
        let group = self
            .commit_comments
            .entry(comment.commit.clone())
            .or_default();
        insert_sorted(group, comment)
    }

    /// Removes the commit comment with the same identity.
    pub fn remove_commit_comment(&mut self, comment: &CommitComment) -> bool {
        remove_from_group(
            &mut self.commit_comments,
            &comment.commit,
            comment.timestamp,
        )
    }

    /// Returns a copy holding only comments made at or after `from`.
    #[must_use]
    pub fn since(&self, from: DateTime<Utc>) -> Self {
        let task_comments = self
            .task_comments
            .iter()
            .filter_map(|(name, by_commit)| {
                let kept: BTreeMap<_, _> = by_commit
                    .iter()
                    .filter_map(|(commit, group)| {
                        recent(group, from).map(|group| (commit.clone(), group))
                    })
                    .collect();
                (!kept.is_empty()).then(|| (name.clone(), kept))
            })
            .collect();
        Self {
            repo: self.repo.clone(),
            task_comments,
            task_spec_comments: recent_groups(&self.task_spec_comments, from),
            commit_comments: recent_groups(&self.commit_comments, from),
        }
    }
}

/// Inserts `comment` keeping `group` sorted by timestamp.
fn insert_sorted<T: Timestamped>(group: &mut Vec<T>, comment: T) -> Result<bool, CommentConflict> {
    let timestamp = comment.timestamp();
    match group.binary_search_by(|existing| existing.timestamp().cmp(&timestamp)) {
        Ok(index) if group.get(index) == Some(&comment) => Ok(false),
        Ok(_) => Err(CommentConflict(comment.identity())),
        Err(index) => {
            group.insert(index, comment);
            Ok(true)
        }
    }
}

/// Removes the comment at `timestamp` from the group under `key`, dropping
/// the group once empty.
fn remove_from_group<T: Timestamped>(
    groups: &mut BTreeMap<String, Vec<T>>,
    key: &str,
    timestamp: DateTime<Utc>,
) -> bool {
    let Some(group) = groups.get_mut(key) else {
        return false;
    };
    let removed = match group.binary_search_by(|existing| existing.timestamp().cmp(&timestamp)) {
        Ok(index) => {
            group.remove(index);
            true
        }
        Err(_) => false,
    };
    if group.is_empty() {
        groups.remove(key);
    }
    removed
}

fn recent<T: Timestamped + Clone>(group: &[T], from: DateTime<Utc>) -> Option<Vec<T>> {
    let start = group.partition_point(|comment| comment.timestamp() < from);
    let kept = group.get(start..).unwrap_or_default();
    (!kept.is_empty()).then(|| kept.to_vec())
}

fn recent_groups<T: Timestamped + Clone>(
    groups: &BTreeMap<String, Vec<T>>,
    from: DateTime<Utc>,
) -> BTreeMap<String, Vec<T>> {
    groups
        .iter()
        .filter_map(|(key, group)| recent(group, from).map(|group| (key.clone(), group)))
        .collect()
}
