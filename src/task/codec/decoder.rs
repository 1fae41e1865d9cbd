//! Parallel task decoder.

use super::{CodecError, JsonTaskCodec, TaskCodec};
use crate::config::TaskStoreConfig;
use crate::task::domain::Task;
use crossbeam::channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Decodes blocks of serialised tasks on a fixed pool of worker threads.
///
/// The pool starts with the first [`TaskDecoder::process`] call.
/// [`TaskDecoder::result`] consumes the decoder, waits for every queued
/// block and returns either all decoded tasks, in no particular order, or
/// the first error.
///
/// ```
/// use taskdb::task::codec::{JsonTaskCodec, TaskCodec, TaskDecoder};
/// use taskdb::task::domain::Task;
///
/// let bytes = JsonTaskCodec
///     .encode(&Task::new("build", "repo", chrono::Utc::now()))
///     .expect("encodable");
/// let mut decoder = TaskDecoder::new();
/// assert!(decoder.process(bytes));
/// let tasks = decoder.result().expect("decodable");
/// assert_eq!(tasks.len(), 1);
/// ```
pub struct TaskDecoder<K = JsonTaskCodec> {
    codec: Arc<K>,
    workers: usize,
    state: DecoderState,
}

enum DecoderState {
    Idle,
    Running(Pipeline),
    Failed(CodecError),
}

/// Message passed from workers to the collector.
enum DecodeOutcome {
    Decoded(Task),
    Failed(CodecError),
}

struct Pipeline {
    input: Sender<Vec<u8>>,
    failed: Arc<AtomicBool>,
    supervisor: JoinHandle<()>,
    collector: JoinHandle<Result<Vec<Task>, CodecError>>,
}

impl TaskDecoder<JsonTaskCodec> {
    /// Creates a JSON decoder with the default pool size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&TaskStoreConfig::default())
    }

    /// Creates a JSON decoder sized by `config`.
    #[must_use]
    pub fn with_config(config: &TaskStoreConfig) -> Self {
        Self::with_codec(JsonTaskCodec, config.decoder_workers)
    }
}

impl Default for TaskDecoder<JsonTaskCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TaskCodec> TaskDecoder<K> {
    /// Creates a decoder running `workers` threads; at least one is used.
    #[must_use]
    pub fn with_codec(codec: K, workers: usize) -> Self {
        Self {
            codec: Arc::new(codec),
            workers: workers.max(1),
            state: DecoderState::Idle,
        }
    }

    /// Queues a block for decoding, blocking while the input buffer is full.
    ///
    /// Returns `false` once decoding has failed; the block is then dropped.
    pub fn process(&mut self, block: Vec<u8>) -> bool {
        if matches!(self.state, DecoderState::Idle) {
            self.state = match Pipeline::start(Arc::clone(&self.codec), self.workers) {
                Ok(pipeline) => DecoderState::Running(pipeline),
                Err(err) => DecoderState::Failed(err),
            };
        }
        match &self.state {
            DecoderState::Running(pipeline) => {
                !pipeline.failed.load(Ordering::Acquire) && pipeline.input.send(block).is_ok()
            }
            DecoderState::Idle | DecoderState::Failed(_) => false,
        }
    }

    /// Waits for all queued blocks and returns the decoded tasks.
    ///
    /// A decoder that never received a block returns an empty list.
    ///
    /// # Errors
    ///
    /// Returns the first decoding error, or [`CodecError::WorkerPanicked`]
    /// when a pool thread panicked.
    pub fn result(self) -> Result<Vec<Task>, CodecError> {
        match self.state {
            DecoderState::Idle => Ok(Vec::new()),
            DecoderState::Failed(err) => Err(err),
            DecoderState::Running(pipeline) => pipeline.finish(),
        }
    }
}

impl Pipeline {
    fn start<K: TaskCodec>(codec: Arc<K>, workers: usize) -> Result<Self, CodecError> {
        let (input_tx, input_rx) = bounded::<Vec<u8>>(workers.saturating_mul(2));
        let (output_tx, output_rx) = bounded::<DecodeOutcome>(workers);
        let failed = Arc::new(AtomicBool::new(false));

        let collector = thread::Builder::new()
            .name("task-decoder-collector".to_owned())
            .spawn(move || collect(&output_rx))
            .map_err(|err| CodecError::Spawn(Arc::new(err)))?;

        let supervisor_failed = Arc::clone(&failed);
        let supervisor = thread::Builder::new()
            .name("task-decoder".to_owned())
            .spawn(move || supervise(&*codec, workers, &input_rx, &output_tx, &supervisor_failed))
            .map_err(|err| CodecError::Spawn(Arc::new(err)))?;

        debug!(workers, "started task decoder");
        Ok(Self {
            input: input_tx,
            failed,
            supervisor,
            collector,
        })
    }

    fn finish(self) -> Result<Vec<Task>, CodecError> {
        let Self {
            input,
            supervisor,
            collector,
            ..
        } = self;
        drop(input);
        let supervised = supervisor.join();
        let collected = collector.join().map_err(|_| CodecError::WorkerPanicked)?;
        supervised.map_err(|_| CodecError::WorkerPanicked)?;
        collected
    }
}

/// Runs the worker pool, then drains whatever input the stopped workers
/// left behind so producers never block on a full buffer.
fn supervise<K: TaskCodec>(
    codec: &K,
    workers: usize,
    input: &Receiver<Vec<u8>>,
    output: &Sender<DecodeOutcome>,
    failed: &AtomicBool,
) {
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let spawned = thread::Builder::new()
                .name(format!("task-decoder-{index}"))
                .spawn_scoped(scope, move || decode_blocks(codec, input, output, failed));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    report_failure(output, failed, CodecError::Spawn(Arc::new(err)));
                    break;
                }
            }
        }
        for handle in handles {
            if handle.join().is_err() {
                report_failure(output, failed, CodecError::WorkerPanicked);
            }
        }
    });
    let discarded = input.iter().count();
    if discarded > 0 {
        debug!(discarded, "discarded blocks after decode failure");
    }
}

fn decode_blocks<K: TaskCodec>(
    codec: &K,
    input: &Receiver<Vec<u8>>,
    output: &Sender<DecodeOutcome>,
    failed: &AtomicBool,
) {
    for block in input {
        if failed.load(Ordering::Acquire) {
            return;
        }
        match codec.decode(&block) {
            Ok(task) => {
                if output.send(DecodeOutcome::Decoded(task)).is_err() {
                    return;
                }
            }
            Err(err) => {
                report_failure(output, failed, err);
                return;
            }
        }
    }
}

fn report_failure(output: &Sender<DecodeOutcome>, failed: &AtomicBool, err: CodecError) {
    failed.store(true, Ordering::Release);
    if output.send(DecodeOutcome::Failed(err)).is_err() {
        debug!("task decoder collector already stopped");
    }
}

fn collect(output: &Receiver<DecodeOutcome>) -> Result<Vec<Task>, CodecError> {
    let mut tasks = Vec::new();
    let mut first_error = None;
    for outcome in output {
        match outcome {
            DecodeOutcome::Decoded(task) if first_error.is_none() => tasks.push(task),
            DecodeOutcome::Decoded(_) => {}
            DecodeOutcome::Failed(err) => {
                if first_error.is_none() {
                    warn!(error = %err, "task decoding failed");
                    tasks.clear();
                    first_error = Some(err);
                }
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(tasks),
    }
}
