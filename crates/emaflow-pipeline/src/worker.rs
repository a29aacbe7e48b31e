//! Shard worker: owns the trackers of one shard.
//!
//! A worker takes work items from its shard queue in order, feeds the
//! events to its trackers, answers the batch's lookup symbols, hands the
//! partial result to the aggregator and then waits for the batch to be
//! released before taking the next item.

use std::collections::HashMap;

use emaflow_core::{PartialResult, SignalType};
use emaflow_telemetry::Metrics;
use emaflow_tracker::{EvalOutcome, Tracker, TrackerConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::release::ReleaseWatch;
use crate::shard::ShardWork;

/// Counters reported when a worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub batches: u64,
    pub events: u64,
    pub late_events: u64,
    pub windows_closed: u64,
    pub trackers: usize,
}

/// Single-owner state of one shard.
pub struct ShardWorker {
    shard: usize,
    config: TrackerConfig,
    trackers: HashMap<String, Tracker>,
    queue: mpsc::Receiver<ShardWork>,
    results: mpsc::Sender<PartialResult>,
    release: ReleaseWatch,
    cancel: CancellationToken,
    stats: WorkerStats,
}

impl ShardWorker {
    pub fn new(
        shard: usize,
        config: TrackerConfig,
        queue: mpsc::Receiver<ShardWork>,
        results: mpsc::Sender<PartialResult>,
        release: ReleaseWatch,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shard,
            config,
            trackers: HashMap::new(),
            queue,
            results,
            release,
            cancel,
            stats: WorkerStats::default(),
        }
    }

    pub fn shard(&self) -> usize {
        self.shard
    }

    pub fn tracker(&self, symbol: &str) -> Option<&Tracker> {
        self.trackers.get(symbol)
    }

    /// Worker loop. Returns once the last batch was released or the queue
    /// closed.
    pub async fn run(&mut self) -> PipelineResult<WorkerStats> {
        loop {
            let work = tokio::select! {
                work = self.queue.recv() => work,
                () = self.cancel.cancelled() => return Err(PipelineError::Aborted),
            };
            let Some(work) = work else {
                debug!(shard = self.shard, "Shard queue closed");
                return Ok(self.finish());
            };

            let partial = self.process(work);
            let seq_id = partial.batch_seq_id;
            let is_last = partial.is_last;

            tokio::select! {
                sent = self.results.send(partial) => {
                    sent.map_err(|_| PipelineError::QueueClosed("result channel".to_string()))?;
                }
                () = self.cancel.cancelled() => return Err(PipelineError::Aborted),
            }

            self.release.wait_released(seq_id, &self.cancel).await?;

            if is_last {
                return Ok(self.finish());
            }
        }
    }

    /// Apply one work item and build the shard's answer for it.
    pub fn process(&mut self, work: ShardWork) -> PartialResult {
        let ShardWork {
            seq_id,
            reference_secs,
            events,
            lookup_symbols,
            is_last,
        } = work;

        let config = self.config;
        let event_count = events.len() as u64;
        let (mut windows, mut late, mut buys, mut sells) = (0u64, 0u64, 0u64, 0u64);

        for event in events {
            let tracker = self
                .trackers
                .entry(event.symbol.clone())
                .or_insert_with(|| Tracker::new(event.symbol.clone(), reference_secs, config));

            match tracker.eval_event(event) {
                EvalOutcome::Updated => {}
                EvalOutcome::Late => late += 1,
                EvalOutcome::Closed {
                    windows: closed,
                    buys: b,
                    sells: s,
                } => {
                    windows += closed;
                    buys += u64::from(b);
                    sells += u64::from(s);
                }
            }
        }

        let mut partial = PartialResult {
            batch_seq_id: seq_id,
            shard: self.shard,
            is_last,
            ..Default::default()
        };
        for symbol in &lookup_symbols {
            if let Some(tracker) = self.trackers.get(symbol) {
                let (indicator, crossovers) = tracker.results();
                partial.indicators.push(indicator);
                partial.crossovers.extend(crossovers);
            }
        }

        self.stats.batches += 1;
        self.stats.events += event_count;
        self.stats.late_events += late;
        self.stats.windows_closed += windows;

        Metrics::events_processed(self.shard, event_count);
        Metrics::trackers_active(self.shard, self.trackers.len());
        Metrics::windows_closed(windows);
        Metrics::late_events(late);
        Metrics::crossovers_emitted(&SignalType::Buy.to_string(), buys);
        Metrics::crossovers_emitted(&SignalType::Sell.to_string(), sells);

        debug!(
            shard = self.shard,
            seq_id,
            events = event_count,
            indicators = partial.indicators.len(),
            crossovers = partial.crossovers.len(),
            "Shard batch processed"
        );

        partial
    }

    fn finish(&mut self) -> WorkerStats {
        self.stats.trackers = self.trackers.len();
        info!(
            shard = self.shard,
            batches = self.stats.batches,
            events = self.stats.events,
            trackers = self.stats.trackers,
            "Shard worker finished"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseSignal;
    use emaflow_core::{Event, SecurityType, Timestamp};

    fn event(symbol: &str, price: f64, secs: i64) -> Event {
        Event::new(symbol, SecurityType::Equity, price, Timestamp::from_secs(secs))
    }

    fn worker() -> (ShardWorker, mpsc::Sender<ShardWork>, mpsc::Receiver<PartialResult>, ReleaseSignal) {
        let (work_tx, work_rx) = mpsc::channel(4);
        let (result_tx, result_rx) = mpsc::channel(4);
        let (signal, watch) = ReleaseSignal::new();
        let worker = ShardWorker::new(
            2,
            TrackerConfig::default(),
            work_rx,
            result_tx,
            watch,
            CancellationToken::new(),
        );
        (worker, work_tx, result_rx, signal)
    }

    #[test]
    fn test_process_creates_trackers_and_answers_lookups() {
        let (mut worker, _tx, _rx, _signal) = worker();
        let partial = worker.process(ShardWork {
            seq_id: 1,
            reference_secs: 0,
            events: vec![event("A", 10.0, 1), event("A", 11.0, 400), event("B", 5.0, 2)],
            lookup_symbols: vec!["A".to_string(), "Z".to_string()],
            is_last: false,
        });

        assert_eq!(partial.batch_seq_id, 1);
        assert_eq!(partial.shard, 2);
        // Z has no tracker and is omitted.
        assert_eq!(partial.indicators.len(), 1);
        assert_eq!(partial.indicators[0].symbol, "A");
        assert!(partial.indicators[0].ema_fast > 0.0);
        assert!(worker.tracker("B").is_some());
        assert!(worker.tracker("Z").is_none());
    }

    #[test]
    fn test_lookup_without_events_reports_existing_state() {
        let (mut worker, _tx, _rx, _signal) = worker();
        worker.process(ShardWork {
            seq_id: 1,
            events: vec![event("A", 10.0, 1), event("A", 11.0, 400)],
            ..Default::default()
        });
        let partial = worker.process(ShardWork {
            seq_id: 2,
            lookup_symbols: vec!["A".to_string()],
            ..Default::default()
        });

        assert_eq!(partial.indicators.len(), 1);
        assert_eq!(partial.indicators[0], worker.tracker("A").unwrap().indicator());
    }

    #[tokio::test]
    async fn test_run_waits_for_release() {
        let (mut worker, tx, mut rx, signal) = worker();
        tx.send(ShardWork {
            seq_id: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        tx.send(ShardWork {
            seq_id: 2,
            is_last: true,
            ..Default::default()
        })
        .await
        .unwrap();

        let handle = tokio::spawn(async move { worker.run().await });

        let first = rx.recv().await.unwrap();
        assert_eq!(first.batch_seq_id, 1);
        // Batch 2 is not taken before batch 1 is released.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());

        signal.release(1);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.batch_seq_id, 2);
        assert!(second.is_last);

        signal.release(2);
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.batches, 2);
    }

    #[tokio::test]
    async fn test_run_ends_when_queue_closes() {
        let (mut worker, tx, _rx, _signal) = worker();
        drop(tx);
        let stats = worker.run().await.unwrap();
        assert_eq!(stats, WorkerStats::default());
    }
}
