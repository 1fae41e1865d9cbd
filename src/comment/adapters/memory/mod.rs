//! In-memory comment storage.

mod comment_box;

pub use comment_box::{CommentBox, CommentWriter, RepoCommentMap};
