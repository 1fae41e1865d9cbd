//! Port contracts for comment storage.

mod store;

pub use store::{CommentStore, CommentStoreError, CommentStoreResult};
