//! emaflow application.
//!
//! Loads configuration, picks a batch source (replay file or synthetic
//! generator), runs the sharded EMA pipeline and writes per-batch results
//! as JSON Lines.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, ConfigOrigin, SourceKind, DEFAULT_CONFIG_PATH};
pub use error::{AppError, AppResult};
