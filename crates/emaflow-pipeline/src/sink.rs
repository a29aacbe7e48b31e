//! Result sink abstraction.

use std::time::Duration;

use emaflow_core::{CrossoverEvent, Indicator};

use crate::error::{PipelineError, PipelineResult};
use crate::source::BoxFuture;

/// Consumer of per-batch results.
///
/// For each batch the pipeline calls `submit_indicators` then
/// `submit_crossovers`, one batch at a time, in ascending sequence order.
pub trait ResultSink: Send + Sync {
    fn submit_indicators(
        &self,
        batch_seq_id: u64,
        indicators: Vec<Indicator>,
    ) -> BoxFuture<'_, PipelineResult<()>>;

    fn submit_crossovers(
        &self,
        batch_seq_id: u64,
        crossovers: Vec<CrossoverEvent>,
    ) -> BoxFuture<'_, PipelineResult<()>>;
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Indicators {
        batch_seq_id: u64,
        items: Vec<Indicator>,
    },
    Crossovers {
        batch_seq_id: u64,
        items: Vec<CrossoverEvent>,
    },
}

impl Submission {
    pub fn batch_seq_id(&self) -> u64 {
        match self {
            Self::Indicators { batch_seq_id, .. } | Self::Crossovers { batch_seq_id, .. } => {
                *batch_seq_id
            }
        }
    }
}

/// Recording sink for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    submissions: parking_lot::Mutex<Vec<Submission>>,
    /// Fail the indicator submission of this sequence id.
    fail_on: parking_lot::Mutex<Option<u64>>,
    delay: Option<Duration>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before recording each call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_on(&self, batch_seq_id: u64) {
        *self.fail_on.lock() = Some(batch_seq_id);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    /// Sequence ids in submission order, one entry per batch.
    pub fn submitted_batches(&self) -> Vec<u64> {
        self.submissions
            .lock()
            .iter()
            .filter_map(|s| match s {
                Submission::Indicators { batch_seq_id, .. } => Some(*batch_seq_id),
                Submission::Crossovers { .. } => None,
            })
            .collect()
    }

    /// Indicators submitted for `batch_seq_id`.
    pub fn indicators_for(&self, batch_seq_id: u64) -> Option<Vec<Indicator>> {
        self.submissions.lock().iter().find_map(|s| match s {
            Submission::Indicators {
                batch_seq_id: id,
                items,
            } if *id == batch_seq_id => Some(items.clone()),
            _ => None,
        })
    }

    /// Crossovers submitted for `batch_seq_id`.
    pub fn crossovers_for(&self, batch_seq_id: u64) -> Option<Vec<CrossoverEvent>> {
        self.submissions.lock().iter().find_map(|s| match s {
            Submission::Crossovers {
                batch_seq_id: id,
                items,
            } if *id == batch_seq_id => Some(items.clone()),
            _ => None,
        })
    }
}

impl ResultSink for MemorySink {
    fn submit_indicators(
        &self,
        batch_seq_id: u64,
        indicators: Vec<Indicator>,
    ) -> BoxFuture<'_, PipelineResult<()>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if *self.fail_on.lock() == Some(batch_seq_id) {
                return Err(PipelineError::Sink(format!(
                    "injected submit failure for batch {batch_seq_id}"
                )));
            }
            self.submissions.lock().push(Submission::Indicators {
                batch_seq_id,
                items: indicators,
            });
            Ok(())
        })
    }

    fn submit_crossovers(
        &self,
        batch_seq_id: u64,
        crossovers: Vec<CrossoverEvent>,
    ) -> BoxFuture<'_, PipelineResult<()>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.submissions.lock().push(Submission::Crossovers {
                batch_seq_id,
                items: crossovers,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records_calls() {
        let sink = MemorySink::new();
        sink.submit_indicators(3, vec![]).await.unwrap();
        sink.submit_crossovers(3, vec![]).await.unwrap();

        let submissions = sink.submissions();
        assert_eq!(submissions.len(), 2);
        assert!(submissions.iter().all(|s| s.batch_seq_id() == 3));
        assert_eq!(sink.submitted_batches(), vec![3]);
        assert_eq!(sink.indicators_for(3), Some(vec![]));
        assert!(sink.crossovers_for(4).is_none());
    }

    #[tokio::test]
    async fn test_memory_sink_injected_failure() {
        let sink = MemorySink::new();
        sink.fail_on(5);

        assert!(sink.submit_indicators(4, vec![]).await.is_ok());
        assert!(matches!(
            sink.submit_indicators(5, vec![]).await,
            Err(PipelineError::Sink(_))
        ));
        assert_eq!(sink.submitted_batches(), vec![4]);
    }
}
