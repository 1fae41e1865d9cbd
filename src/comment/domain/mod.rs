//! Comment domain model.
//!
//! Comments are free-text annotations on tasks, task specs and commits,
//! grouped per repository. Within a group they are kept in timestamp order;
//! a comment's identity is its grouping keys plus its timestamp.

mod comment;
mod repo;

pub use comment::{CommitComment, TaskComment, TaskSpecComment};
pub use repo::{CommentConflict, RepoComments, TaskCommentsByName};
