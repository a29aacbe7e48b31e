//! Per-symbol windowed EMA and crossover tracking.
//!
//! A `Tracker` consumes the events of one symbol in order and maintains a
//! fast/slow exponential moving average over fixed-length tumbling
//! windows. Every window close compares the relative order of the two
//! averages before and after the close and records Buy/Sell crossovers in
//! a bounded history.

pub mod config;
pub mod ema;
pub mod error;
pub mod history;
pub mod tracker;

pub use config::{TrackerConfig, WindowGapPolicy};
pub use ema::{detect_crossover, ema, smoothing};
pub use error::{TrackerError, TrackerResult};
pub use history::{CrossoverHistory, MAX_CROSSOVERS};
pub use tracker::{EvalOutcome, Tracker};
