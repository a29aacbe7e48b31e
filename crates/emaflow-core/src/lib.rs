//! Core domain types for the emaflow tick pipeline.
//!
//! This crate provides the types shared by every stage of the pipeline:
//! - `Timestamp`: seconds + nanoseconds trade time, totally ordered
//! - `Event`, `Batch`: the ordered input stream
//! - `Indicator`, `CrossoverEvent`: per-symbol analytics
//! - `PartialResult`, `CombinedResult`: shard-local and merged batch output

pub mod error;
pub mod event;
pub mod result;
pub mod time;

pub use error::{CoreError, Result};
pub use event::{Batch, Event, SecurityType};
pub use result::{CombinedResult, CrossoverEvent, Indicator, PartialResult, SignalType};
pub use time::Timestamp;
