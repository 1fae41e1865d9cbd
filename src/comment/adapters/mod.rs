//! Comment store adapters.
//!
//! - [`memory::CommentBox`]: in-memory store with an optional persistence
//!   hook
//! - [`file::CommentSnapshotFile`]: JSON snapshot usable as that hook

pub mod file;
pub mod memory;
