//! Tracker error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
