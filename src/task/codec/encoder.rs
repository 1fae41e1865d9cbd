//! Fail-fast task encoder.

use super::{CodecError, JsonTaskCodec, TaskCodec};
use crate::task::domain::Task;
use std::collections::VecDeque;
use tracing::warn;

/// Serialises tasks and hands back `(task, bytes)` pairs.
///
/// After the first serialisation error the encoder drops everything it
/// holds, rejects further input and reports that error from
/// [`TaskEncoder::next_encoded`].
#[derive(Debug)]
pub struct TaskEncoder<K = JsonTaskCodec> {
    codec: K,
    encoded: VecDeque<(Task, Vec<u8>)>,
    failure: Option<CodecError>,
}

impl TaskEncoder<JsonTaskCodec> {
    /// Creates a JSON encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::with_codec(JsonTaskCodec)
    }
}

impl Default for TaskEncoder<JsonTaskCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TaskCodec> TaskEncoder<K> {
    /// Creates an encoder using `codec`.
    #[must_use]
    pub fn with_codec(codec: K) -> Self {
        Self {
            codec,
            encoded: VecDeque::new(),
            failure: None,
        }
    }

    /// Serialises a copy of `task`.
    ///
    /// Returns `false` when the task was not accepted because this or an
    /// earlier call failed.
    pub fn process(&mut self, task: &Task) -> bool {
        if self.failure.is_some() {
            return false;
        }
        match self.codec.encode(task) {
            Ok(bytes) => {
                self.encoded.push_back((task.clone(), bytes));
                true
            }
            Err(err) => {
                warn!(task_id = %task.display_id(), error = %err, "task encoding failed");
                self.encoded.clear();
                self.failure = Some(err);
                false
            }
        }
    }

    /// Returns the next encoded pair, `None` once drained.
    ///
    /// # Errors
    ///
    /// Returns the first recorded encoding error.
    pub fn next_encoded(&mut self) -> Result<Option<(Task, Vec<u8>)>, CodecError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.encoded.pop_front()),
        }
    }
}
