//! Pipeline orchestration: wires source, dispatcher, shard workers,
//! aggregator and sink for one run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use emaflow_tracker::TrackerConfig;
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::{Aggregator, AggregatorStats};
use crate::config::PipelineConfig;
use crate::dispatcher::{Dispatcher, SourceCursor};
use crate::error::{PipelineError, PipelineResult};
use crate::release::ReleaseSignal;
use crate::sink::ResultSink;
use crate::source::BatchSource;
use crate::worker::{ShardWorker, WorkerStats};

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub batches_dispatched: u64,
    pub batches_submitted: u64,
    pub last_seq_id: Option<u64>,
    pub events_processed: u64,
    pub late_events: u64,
    pub windows_closed: u64,
    pub trackers: usize,
    pub indicators_submitted: u64,
    pub crossovers_submitted: u64,
    /// Window anchor used by the run.
    pub reference_secs: Option<i64>,
    pub elapsed: Duration,
}

/// Records the first real failure of a run and cancels every task.
struct FailureLatch {
    root: parking_lot::Mutex<Option<PipelineError>>,
    cancel: CancellationToken,
}

impl FailureLatch {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            root: parking_lot::Mutex::new(None),
            cancel,
        }
    }

    /// Pass a task result through, capturing its error.
    fn settle<T>(&self, task: &str, result: PipelineResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.fail(task, e);
                None
            }
        }
    }

    fn fail(&self, task: &str, e: PipelineError) {
        let mut root = self.root.lock();
        if root.is_none() && !e.is_abort() {
            error!(task, error = %e, "Pipeline task failed, aborting run");
            *root = Some(e);
            self.cancel.cancel();
        } else {
            debug!(task, error = %e, "Secondary task failure");
        }
    }

    fn take(&self) -> Option<PipelineError> {
        self.root.lock().take()
    }
}

/// One configured pipeline. `run` may be called once per source.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    tracker_config: TrackerConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, tracker_config: TrackerConfig) -> PipelineResult<Self> {
        config.validate()?;
        tracker_config.validate()?;
        Ok(Self {
            config,
            tracker_config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker_config(&self) -> &TrackerConfig {
        &self.tracker_config
    }

    /// Process every batch of `source` and submit the results to `sink`.
    ///
    /// Returns the first failure of any task; the other tasks are
    /// cancelled and the call does not hang. The source is stopped in
    /// both cases.
    pub async fn run(
        &self,
        source: Arc<dyn BatchSource>,
        sink: Arc<dyn ResultSink>,
    ) -> PipelineResult<PipelineReport> {
        let started = Instant::now();
        info!(
            shards = self.config.num_shards,
            producers = self.config.num_producers,
            queue_capacity = self.config.queue_capacity,
            "Starting pipeline"
        );

        source.start().await?;
        let outcome = self.run_session(source.clone(), sink).await;
        let stopped = source.stop().await;

        match (outcome, stopped) {
            (Ok(mut report), Ok(())) => {
                report.elapsed = started.elapsed();
                info!(
                    batches = report.batches_submitted,
                    events = report.events_processed,
                    crossovers = report.crossovers_submitted,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Pipeline finished"
                );
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), stopped) => {
                if let Err(stop_err) = stopped {
                    warn!(error = %stop_err, "Source stop failed after pipeline error");
                }
                Err(e)
            }
        }
    }

    async fn run_session(
        &self,
        source: Arc<dyn BatchSource>,
        sink: Arc<dyn ResultSink>,
    ) -> PipelineResult<PipelineReport> {
        let cursor = Arc::new(SourceCursor::new(source));

        // Fetched here so it can anchor the windows before any work starts.
        let Some(first) = cursor.claim().await? else {
            info!("Source has no batches");
            return Ok(PipelineReport::default());
        };
        let reference_secs = self
            .config
            .reference_secs
            .or_else(|| first.first_trade().map(|ts| ts.seconds))
            .unwrap_or(0);
        info!(
            first_seq_id = first.seq_id,
            reference_secs, "Window reference fixed"
        );

        let num_shards = self.config.num_shards;
        let cancel = CancellationToken::new();
        let latch = Arc::new(FailureLatch::new(cancel.clone()));

        let (result_tx, result_rx) = mpsc::channel(num_shards);
        let (release, release_watch) = ReleaseSignal::new();

        let mut queues = Vec::with_capacity(num_shards);
        let mut workers: Vec<JoinHandle<Option<WorkerStats>>> = Vec::with_capacity(num_shards);
        for shard in 0..num_shards {
            let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity);
            queues.push(queue_tx);

            let mut worker = ShardWorker::new(
                shard,
                self.tracker_config,
                queue_rx,
                result_tx.clone(),
                release_watch.clone(),
                cancel.clone(),
            );
            let latch = latch.clone();
            workers.push(tokio::spawn(async move {
                let result = worker.run().await;
                latch.settle("shard worker", result)
            }));
        }
        drop(result_tx);
        drop(release_watch);

        let aggregator = {
            let mut aggregator =
                Aggregator::new(num_shards, result_rx, sink, release, cancel.clone());
            let latch = latch.clone();
            tokio::spawn(async move {
                let result = aggregator.run().await;
                latch.settle("aggregator", result)
            })
        };

        let dispatcher = Arc::new(Dispatcher::new(
            queues,
            first.seq_id,
            reference_secs,
            cancel.clone(),
        ));

        let first_is_last = first.is_last;
        let mut batches_dispatched = 0u64;
        let mut producers: Vec<JoinHandle<Option<u64>>> = Vec::new();
        if latch
            .settle("dispatcher", dispatcher.dispatch(first).await)
            .is_some()
        {
            batches_dispatched += 1;
            if !first_is_last {
                for producer in 0..self.config.num_producers {
                    let fut = dispatcher.clone().run_producer(producer, cursor.clone());
                    let latch = latch.clone();
                    producers.push(tokio::spawn(async move {
                        latch.settle("producer", fut.await)
                    }));
                }
            }
        }
        // Queues close once every producer is done.
        drop(dispatcher);

        let mut aborted = false;
        for joined in join_all(producers.into_iter().map(|h| join(&latch, h))).await {
            match joined {
                Some(count) => batches_dispatched += count,
                None => aborted = true,
            }
        }

        let mut report = PipelineReport {
            batches_dispatched,
            reference_secs: Some(reference_secs),
            ..Default::default()
        };
        for joined in join_all(workers.into_iter().map(|h| join(&latch, h))).await {
            match joined {
                Some(stats) => {
                    report.events_processed += stats.events;
                    report.late_events += stats.late_events;
                    report.windows_closed += stats.windows_closed;
                    report.trackers += stats.trackers;
                }
                None => aborted = true,
            }
        }

        match join(&latch, aggregator).await {
            Some(AggregatorStats {
                batches,
                indicators,
                crossovers,
                last_seq_id,
            }) => {
                report.batches_submitted = batches;
                report.indicators_submitted = indicators;
                report.crossovers_submitted = crossovers;
                report.last_seq_id = last_seq_id;
            }
            None => aborted = true,
        }

        if let Some(root) = latch.take() {
            return Err(root);
        }
        if aborted {
            return Err(PipelineError::Aborted);
        }
        Ok(report)
    }
}

/// Await a task, folding panics and cancellation into the latch.
async fn join<T>(latch: &FailureLatch, handle: JoinHandle<Option<T>>) -> Option<T> {
    match handle.await {
        Ok(value) => value,
        Err(e) => {
            latch.fail("join", PipelineError::Task(e.to_string()));
            None
        }
    }
}
