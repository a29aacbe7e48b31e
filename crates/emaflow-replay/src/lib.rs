//! File-backed and synthetic collaborators for the emaflow pipeline.
//!
//! - [`ReplaySource`]: replays a JSON Lines recording of batches
//! - [`SyntheticSource`]: generates a deterministic stream
//! - [`JsonLinesSink`]: writes submissions as JSON Lines

pub mod error;
pub mod replay;
pub mod sink;
pub mod synthetic;

pub use error::{ReplayError, ReplayResult};
pub use replay::{write_recording, ReplaySource};
pub use sink::{read_records, JsonLinesSink, SinkRecord};
pub use synthetic::{SyntheticConfig, SyntheticSource};
