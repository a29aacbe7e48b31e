//! Producer side: fetch batches, partition them, enqueue in order.
//!
//! Several producers run concurrently. Fetching is serialized through
//! [`SourceCursor`]; partitioning runs in parallel; enqueueing is ordered
//! by the [`SequenceGate`] so that every shard queue receives batches in
//! ascending sequence order.

use std::sync::Arc;
use std::time::Instant;

use emaflow_core::Batch;
use emaflow_telemetry::Metrics;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::gate::SequenceGate;
use crate::shard::{partition, ShardWork};
use crate::source::BatchSource;

#[derive(Debug, Default)]
struct CursorState {
    /// No further batch will be handed out.
    ended: bool,
    /// Expected id of the next batch, once the first one was seen.
    next_seq: Option<u64>,
}

/// Serialized access to a [`BatchSource`].
///
/// Checks `has_next` and fetches under one lock, and enforces contiguous
/// sequence ids so that the gate can always make progress.
pub struct SourceCursor {
    source: Arc<dyn BatchSource>,
    state: Mutex<CursorState>,
}

impl SourceCursor {
    pub fn new(source: Arc<dyn BatchSource>) -> Self {
        Self {
            source,
            state: Mutex::new(CursorState::default()),
        }
    }

    /// Claim the next batch, or `None` once the stream is drained.
    pub async fn claim(&self) -> PipelineResult<Option<Batch>> {
        let mut state = self.state.lock().await;
        if state.ended {
            return Ok(None);
        }
        if !self.source.has_next() {
            state.ended = true;
            return Ok(None);
        }

        let batch = match self.source.next().await {
            Ok(batch) => batch,
            Err(e) => {
                state.ended = true;
                return Err(e);
            }
        };

        if let Some(expected) = state.next_seq {
            if batch.seq_id != expected {
                state.ended = true;
                return Err(PipelineError::OutOfSequence {
                    expected,
                    got: batch.seq_id,
                });
            }
        }
        state.next_seq = Some(batch.seq_id + 1);
        if batch.is_last {
            state.ended = true;
        }

        Ok(Some(batch))
    }
}

/// Shared producer state: shard queues, gate and window anchor.
pub struct Dispatcher {
    queues: Vec<mpsc::Sender<ShardWork>>,
    gate: SequenceGate,
    reference_secs: i64,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// `first_seq_id` is the id of the first batch that will be dispatched.
    pub fn new(
        queues: Vec<mpsc::Sender<ShardWork>>,
        first_seq_id: u64,
        reference_secs: i64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queues,
            gate: SequenceGate::new(first_seq_id),
            reference_secs,
            cancel,
        }
    }

    pub fn num_shards(&self) -> usize {
        self.queues.len()
    }

    /// Next sequence id the gate admits.
    pub fn next_seq_id(&self) -> u64 {
        self.gate.current()
    }

    /// Partition `batch` and enqueue one work item per shard once it is
    /// this batch's turn.
    pub async fn dispatch(&self, batch: Batch) -> PipelineResult<()> {
        let seq_id = batch.seq_id;
        let events = batch.events.len();
        let parts = partition(batch, self.queues.len(), self.reference_secs);

        let waited = Instant::now();
        self.gate.wait_turn(seq_id, &self.cancel).await?;
        Metrics::gate_wait(waited.elapsed().as_secs_f64() * 1000.0);

        for (shard, (queue, work)) in self.queues.iter().zip(parts).enumerate() {
            Metrics::shard_queue_depth(shard, queue.max_capacity() - queue.capacity());
            tokio::select! {
                sent = queue.send(work) => {
                    sent.map_err(|_| PipelineError::QueueClosed(format!("shard {shard} queue")))?;
                }
                () = self.cancel.cancelled() => return Err(PipelineError::Aborted),
            }
        }

        self.gate.advance(seq_id);
        Metrics::batch_dispatched();
        debug!(seq_id, events, "Batch dispatched");
        Ok(())
    }

    /// Producer loop: claim, dispatch, repeat until the cursor is drained.
    ///
    /// Returns the number of batches this producer dispatched.
    pub async fn run_producer(
        self: Arc<Self>,
        producer: usize,
        cursor: Arc<SourceCursor>,
    ) -> PipelineResult<u64> {
        let mut dispatched = 0u64;
        loop {
            let claimed = tokio::select! {
                claimed = cursor.claim() => claimed?,
                () = self.cancel.cancelled() => return Err(PipelineError::Aborted),
            };

            let Some(batch) = claimed else {
                info!(producer, dispatched, "Producer finished");
                return Ok(dispatched);
            };

            self.dispatch(batch).await?;
            dispatched += 1;
        }
    }
}
