//! Concurrent, order-preserving EMA pipeline.
//!
//! Batches flow from a [`BatchSource`] through N producers, are split by
//! symbol across M shards, evaluated by per-shard [`ShardWorker`]s and
//! merged by the [`Aggregator`], which submits them to a [`ResultSink`]
//! in strictly ascending sequence order.
//!
//! ```text
//! source -> producers -> [gate] -> shard queues -> workers -> aggregator -> sink
//!                                                     ^            |
//!                                                     +-- release -+
//! ```

pub mod aggregator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod release;
pub mod shard;
pub mod sink;
pub mod source;
pub mod worker;

pub use aggregator::{merge, Aggregator, AggregatorStats};
pub use config::PipelineConfig;
pub use dispatcher::{Dispatcher, SourceCursor};
pub use error::{PipelineError, PipelineResult};
pub use gate::SequenceGate;
pub use pipeline::{Pipeline, PipelineReport};
pub use release::{ReleaseSignal, ReleaseWatch};
pub use shard::{partition, shard_for, ShardWork};
pub use sink::{MemorySink, ResultSink, Submission};
pub use source::{BatchSource, BoxFuture, MemorySource};
pub use worker::{ShardWorker, WorkerStats};
