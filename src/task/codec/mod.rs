//! Bulk serialisation of task batches.
//!
//! [`TaskEncoder`] serialises tasks one at a time and fails fast on the
//! first error. [`TaskDecoder`] spreads deserialisation over a fixed pool of
//! worker threads and reports either every decoded task or the first error,
//! never a partial batch.
//!
//! The byte format is chosen by a [`TaskCodec`]. [`JsonTaskCodec`] relies on
//! the `#[serde(default)]` attributes of [`Task`] so payloads written before
//! a field existed still decode.

mod decoder;
mod encoder;

pub use decoder::TaskDecoder;
pub use encoder::TaskEncoder;

use crate::task::domain::Task;
use std::sync::Arc;
use thiserror::Error;

/// Stable serialiser for single tasks.
pub trait TaskCodec: Send + Sync + 'static {
    /// Serialises a task.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] when the task cannot be serialised.
    fn encode(&self, task: &Task) -> Result<Vec<u8>, CodecError>;

    /// Deserialises a task.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] for malformed input.
    fn decode(&self, bytes: &[u8]) -> Result<Task, CodecError>;
}

/// JSON task codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTaskCodec;

impl TaskCodec for JsonTaskCodec {
    fn encode(&self, task: &Task) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(task).map_err(|err| CodecError::Encode(Arc::new(err)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Task, CodecError> {
        serde_json::from_slice(bytes).map_err(|err| CodecError::Decode(Arc::new(err)))
    }
}

/// Errors raised while encoding or decoding task batches.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// A task could not be serialised.
    #[error("failed to encode task: {0}")]
    Encode(Arc<dyn std::error::Error + Send + Sync>),

    /// A block could not be deserialised.
    #[error("failed to decode task: {0}")]
    Decode(Arc<dyn std::error::Error + Send + Sync>),

    /// A decoder thread panicked.
    #[error("task decoder worker panicked")]
    WorkerPanicked,

    /// A decoder thread could not be started.
    #[error("failed to spawn task decoder thread: {0}")]
    Spawn(Arc<std::io::Error>),
}
