//! JSON snapshot of every repository's comments.

use crate::comment::adapters::memory::{CommentWriter, RepoCommentMap};
use crate::comment::ports::{CommentStoreError, CommentStoreResult};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::debug;

/// Snapshot file holding the full comment map as JSON.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written snapshot.
#[derive(Debug)]
pub struct CommentSnapshotFile {
    dir: Dir,
    file_name: String,
}

impl CommentSnapshotFile {
    /// Uses `file_name` inside an already opened directory.
    #[must_use]
    pub fn new(dir: Dir, file_name: impl Into<String>) -> Self {
        Self {
            dir,
            file_name: file_name.into(),
        }
    }

    /// Opens the directory at `dir_path` with ambient authority.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::Persistence`] when the directory cannot
    /// be opened.
    pub fn open_ambient(dir_path: &str, file_name: impl Into<String>) -> CommentStoreResult<Self> {
        let dir = Dir::open_ambient_dir(dir_path, ambient_authority())
            .map_err(CommentStoreError::persistence)?;
        Ok(Self::new(dir, file_name))
    }

    /// Reads the snapshot; a missing file yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::Persistence`] when the file cannot be
    /// read or parsed.
    pub fn load(&self) -> CommentStoreResult<RepoCommentMap> {
        let contents = match self.dir.read_to_string(&self.file_name) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(RepoCommentMap::new()),
            Err(err) => return Err(CommentStoreError::persistence(err)),
        };
        serde_json::from_str(&contents).map_err(CommentStoreError::persistence)
    }

    /// Replaces the snapshot with `comments`.
    ///
    /// # Errors
    ///
    /// Returns [`CommentStoreError::Persistence`] when serialisation or any
    /// filesystem step fails.
    pub fn write(&self, comments: &RepoCommentMap) -> CommentStoreResult<()> {
        let encoded = serde_json::to_vec_pretty(comments).map_err(CommentStoreError::persistence)?;
        let staging = format!("{}.tmp", self.file_name);
        self.dir
            .write(&staging, &encoded)
            .map_err(CommentStoreError::persistence)?;
        self.dir
            .rename(&staging, &self.dir, &self.file_name)
            .map_err(CommentStoreError::persistence)?;
        debug!(file = %self.file_name, repos = comments.len(), "wrote comment snapshot");
        Ok(())
    }

    /// Turns the snapshot into a writer for
    /// [`CommentBox::with_persistence`](crate::comment::adapters::memory::CommentBox::with_persistence).
    #[must_use]
    pub fn into_writer(self) -> CommentWriter {
        Arc::new(move |comments: &RepoCommentMap| self.write(comments))
    }
}
