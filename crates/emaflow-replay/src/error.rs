//! Replay error types.

use emaflow_core::CoreError;
use emaflow_pipeline::PipelineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid batch at line {line}: {reason}")]
    Format { line: usize, reason: String },

    #[error("Invalid batch: {0}")]
    Core(#[from] CoreError),

    #[error("Source not started")]
    NotStarted,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ReplayResult<T> = Result<T, ReplayError>;

impl From<ReplayError> for PipelineError {
    fn from(e: ReplayError) -> Self {
        match e {
            ReplayError::Config(msg) => PipelineError::Config(msg),
            other => PipelineError::Source(other.to_string()),
        }
    }
}
