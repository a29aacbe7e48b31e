//! Pipeline error types.

use emaflow_tracker::TrackerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Shard results of one aggregation round disagree on the batch id.
    #[error("Protocol violation: round for batch {expected} received a result for batch {got}")]
    ProtocolViolation { expected: u64, got: u64 },

    /// A shard delivered twice in one round, or a round was incomplete.
    #[error("Shard desync on batch {seq_id}: {detail}")]
    ShardDesync { seq_id: u64, detail: String },

    /// Source produced a non-contiguous or repeated batch id.
    #[error("Out of sequence batch: expected {expected}, got {got}")]
    OutOfSequence { expected: u64, got: u64 },

    #[error("Source error: {0}")]
    Source(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Channel closed: {0}")]
    QueueClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tracker configuration error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Task failed: {0}")]
    Task(String),

    /// Secondary failure: the run was cancelled by another task's error.
    #[error("Pipeline aborted")]
    Aborted,
}

impl PipelineError {
    /// True for the cancellation echo that follows a root-cause failure.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
