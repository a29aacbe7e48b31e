//! Batch source abstraction.
//!
//! The pipeline pulls batches through [`BatchSource`]. Implementations
//! wrap a replay file, a synthetic generator or, in tests, the in-memory
//! [`MemorySource`].

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use emaflow_core::Batch;

use crate::error::{PipelineError, PipelineResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Pull-based producer of ordered batches.
///
/// `has_next` and `next` form a single-consumer cursor: the pipeline never
/// calls them concurrently.
pub trait BatchSource: Send + Sync {
    /// Begin a session. Called once before the first batch.
    fn start(&self) -> BoxFuture<'_, PipelineResult<()>>;

    /// Whether another batch can be fetched.
    fn has_next(&self) -> bool;

    /// Fetch the next batch.
    fn next(&self) -> BoxFuture<'_, PipelineResult<Batch>>;

    /// End the session. Called once after the last batch was submitted.
    fn stop(&self) -> BoxFuture<'_, PipelineResult<()>>;
}

/// In-memory batch source.
pub struct MemorySource {
    batches: parking_lot::Mutex<VecDeque<Batch>>,
    /// Simulated fetch latency.
    fetch_delay: Option<Duration>,
    /// Fail the fetch of this sequence id.
    fail_on: parking_lot::Mutex<Option<u64>>,
    starts: AtomicU32,
    stops: AtomicU32,
}

impl MemorySource {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self {
            batches: parking_lot::Mutex::new(batches.into()),
            fetch_delay: None,
            fail_on: parking_lot::Mutex::new(None),
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
        }
    }

    /// Sleep for `delay` on every fetch.
    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Make the fetch of `seq_id` fail with a source error.
    pub fn fail_on(&self, seq_id: u64) {
        *self.fail_on.lock() = Some(seq_id);
    }

    pub fn remaining(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

impl BatchSource for MemorySource {
    fn start(&self) -> BoxFuture<'_, PipelineResult<()>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn has_next(&self) -> bool {
        !self.batches.lock().is_empty()
    }

    fn next(&self) -> BoxFuture<'_, PipelineResult<Batch>> {
        Box::pin(async move {
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }

            let batch = self
                .batches
                .lock()
                .pop_front()
                .ok_or_else(|| PipelineError::Source("no batch left".to_string()))?;

            if *self.fail_on.lock() == Some(batch.seq_id) {
                return Err(PipelineError::Source(format!(
                    "injected fetch failure for batch {}",
                    batch.seq_id
                )));
            }

            Ok(batch)
        })
    }

    fn stop(&self) -> BoxFuture<'_, PipelineResult<()>> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}
