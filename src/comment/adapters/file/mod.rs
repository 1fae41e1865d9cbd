//! File-backed comment snapshots.

mod snapshot;

pub use snapshot::CommentSnapshotFile;
