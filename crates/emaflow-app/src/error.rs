//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] emaflow_pipeline::PipelineError),

    #[error("Replay error: {0}")]
    Replay(#[from] emaflow_replay::ReplayError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] emaflow_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shutdown requested")]
    Shutdown,
}

pub type AppResult<T> = Result<T, AppError>;
