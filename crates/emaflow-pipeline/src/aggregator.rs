//! Aggregator: merges shard results and submits them in batch order.
//!
//! One round per batch. A round collects exactly one partial result per
//! shard, checks they agree on the batch id, merges them in shard index
//! order, submits indicators then crossovers, and finally releases the
//! workers.

use std::sync::Arc;
use std::time::Instant;

use emaflow_core::{CombinedResult, PartialResult};
use emaflow_telemetry::Metrics;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::release::ReleaseSignal;
use crate::sink::ResultSink;

/// Counters reported when the aggregator exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    pub batches: u64,
    pub indicators: u64,
    pub crossovers: u64,
    pub last_seq_id: Option<u64>,
}

pub struct Aggregator {
    num_shards: usize,
    results: mpsc::Receiver<PartialResult>,
    sink: Arc<dyn ResultSink>,
    release: ReleaseSignal,
    cancel: CancellationToken,
    stats: AggregatorStats,
}

impl Aggregator {
    pub fn new(
        num_shards: usize,
        results: mpsc::Receiver<PartialResult>,
        sink: Arc<dyn ResultSink>,
        release: ReleaseSignal,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            num_shards,
            results,
            sink,
            release,
            cancel,
            stats: AggregatorStats::default(),
        }
    }

    /// Aggregation loop. Returns after the last batch was submitted, or
    /// when every worker has gone away between rounds.
    pub async fn run(&mut self) -> PipelineResult<AggregatorStats> {
        loop {
            let Some((partials, started)) = self.collect_round().await? else {
                info!(
                    batches = self.stats.batches,
                    "Result channel closed, aggregator finished"
                );
                return Ok(self.stats);
            };

            let is_last = partials.iter().any(|p| p.is_last);
            let combined = merge(partials, self.num_shards)?;
            let seq_id = combined.batch_seq_id;

            if let Some(prev) = self.stats.last_seq_id {
                if seq_id != prev + 1 {
                    return Err(PipelineError::OutOfSequence {
                        expected: prev + 1,
                        got: seq_id,
                    });
                }
            }

            self.submit(combined).await?;
            self.release.release(seq_id);
            Metrics::aggregation_round(started.elapsed().as_secs_f64() * 1000.0);

            if is_last {
                info!(
                    batches = self.stats.batches,
                    last_seq_id = seq_id,
                    "Last batch submitted"
                );
                return Ok(self.stats);
            }
        }
    }

    /// Gather one partial per shard. `None` if the channel closed before
    /// the round started.
    async fn collect_round(&mut self) -> PipelineResult<Option<(Vec<PartialResult>, Instant)>> {
        let mut partials = Vec::with_capacity(self.num_shards);
        let mut started = Instant::now();

        while partials.len() < self.num_shards {
            let received = tokio::select! {
                received = self.results.recv() => received,
                () = self.cancel.cancelled() => return Err(PipelineError::Aborted),
            };

            match received {
                Some(partial) => {
                    if partials.is_empty() {
                        started = Instant::now();
                    }
                    partials.push(partial);
                }
                None if partials.is_empty() => return Ok(None),
                None => {
                    let seq_id = partials[0].batch_seq_id;
                    return Err(PipelineError::ShardDesync {
                        seq_id,
                        detail: format!(
                            "result channel closed after {} of {} shards",
                            partials.len(),
                            self.num_shards
                        ),
                    });
                }
            }
        }

        Ok(Some((partials, started)))
    }

    async fn submit(&mut self, combined: CombinedResult) -> PipelineResult<()> {
        let CombinedResult {
            batch_seq_id,
            indicators,
            crossovers,
        } = combined;
        let (indicator_count, crossover_count) = (indicators.len(), crossovers.len());

        if let Err(e) = self.sink.submit_indicators(batch_seq_id, indicators).await {
            Metrics::submit_failed("indicators");
            error!(batch_seq_id, error = %e, "Indicator submission failed");
            return Err(e);
        }
        if let Err(e) = self.sink.submit_crossovers(batch_seq_id, crossovers).await {
            Metrics::submit_failed("crossovers");
            error!(batch_seq_id, error = %e, "Crossover submission failed");
            return Err(e);
        }

        self.stats.batches += 1;
        self.stats.indicators += indicator_count as u64;
        self.stats.crossovers += crossover_count as u64;
        self.stats.last_seq_id = Some(batch_seq_id);
        Metrics::batch_submitted(batch_seq_id);

        debug!(
            batch_seq_id,
            indicators = indicator_count,
            crossovers = crossover_count,
            "Batch submitted"
        );
        Ok(())
    }
}

/// Merge one round of partial results in shard index order.
///
/// Fails if the partials disagree on the batch id or a shard reported
/// twice.
pub fn merge(mut partials: Vec<PartialResult>, num_shards: usize) -> PipelineResult<CombinedResult> {
    let Some(first) = partials.first() else {
        return Err(PipelineError::ShardDesync {
            seq_id: 0,
            detail: "empty round".to_string(),
        });
    };
    let expected = first.batch_seq_id;

    if let Some(other) = partials.iter().find(|p| p.batch_seq_id != expected) {
        warn!(expected, got = other.batch_seq_id, shard = other.shard, "Mixed round");
        return Err(PipelineError::ProtocolViolation {
            expected,
            got: other.batch_seq_id,
        });
    }

    partials.sort_by_key(|p| p.shard);
    let mut seen = vec![false; num_shards];
    for partial in &partials {
        match seen.get_mut(partial.shard) {
            Some(flag) if !*flag => *flag = true,
            _ => {
                return Err(PipelineError::ShardDesync {
                    seq_id: expected,
                    detail: format!("unexpected result from shard {}", partial.shard),
                });
            }
        }
    }

    let mut combined = CombinedResult::new(expected);
    for partial in partials {
        combined.absorb(partial);
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use emaflow_core::Indicator;

    fn partial(seq: u64, shard: usize, symbol: &str) -> PartialResult {
        PartialResult {
            batch_seq_id: seq,
            shard,
            indicators: vec![Indicator {
                symbol: symbol.to_string(),
                ema_fast: 1.0,
                ema_slow: 2.0,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_orders_by_shard() {
        let combined = merge(vec![partial(4, 1, "B"), partial(4, 0, "A")], 2).unwrap();
        let symbols: Vec<_> = combined.indicators.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B"]);
        assert_eq!(combined.batch_seq_id, 4);
    }

    #[test]
    fn test_merge_rejects_mixed_round() {
        let err = merge(vec![partial(4, 0, "A"), partial(5, 1, "B")], 2).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ProtocolViolation {
                expected: 4,
                got: 5
            }
        ));
    }

    #[test]
    fn test_merge_rejects_duplicate_shard() {
        let err = merge(vec![partial(4, 0, "A"), partial(4, 0, "B")], 2).unwrap_err();
        assert!(matches!(err, PipelineError::ShardDesync { seq_id: 4, .. }));
    }

    #[tokio::test]
    async fn test_round_submits_and_releases() {
        let (tx, rx) = mpsc::channel(4);
        let sink = Arc::new(MemorySink::new());
        let (signal, mut watch) = ReleaseSignal::new();
        let cancel = CancellationToken::new();
        let mut aggregator = Aggregator::new(2, rx, sink.clone(), signal, cancel.clone());

        tx.send(partial(1, 1, "B")).await.unwrap();
        tx.send(PartialResult {
            is_last: true,
            ..partial(1, 0, "A")
        })
        .await
        .unwrap();

        let stats = aggregator.run().await.unwrap();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.indicators, 2);
        assert_eq!(stats.last_seq_id, Some(1));
        assert_eq!(sink.submitted_batches(), vec![1]);
        watch.wait_released(1, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_mixed_round_is_fatal() {
        let (tx, rx) = mpsc::channel(4);
        let sink = Arc::new(MemorySink::new());
        let (signal, _watch) = ReleaseSignal::new();
        let mut aggregator = Aggregator::new(2, rx, sink.clone(), signal, CancellationToken::new());

        tx.send(partial(1, 0, "A")).await.unwrap();
        tx.send(partial(2, 1, "B")).await.unwrap();

        let err = aggregator.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::ProtocolViolation { .. }));
        assert!(sink.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_round_is_fatal() {
        let (tx, rx) = mpsc::channel(4);
        let (signal, _watch) = ReleaseSignal::new();
        let mut aggregator = Aggregator::new(
            3,
            rx,
            Arc::new(MemorySink::new()),
            signal,
            CancellationToken::new(),
        );

        tx.send(partial(1, 0, "A")).await.unwrap();
        drop(tx);

        let err = aggregator.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::ShardDesync { seq_id: 1, .. }));
    }
}
