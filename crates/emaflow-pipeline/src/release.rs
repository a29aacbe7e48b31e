//! Release signal from the aggregator to the shard workers.
//!
//! After a batch is submitted the aggregator publishes its sequence id.
//! Workers that reported on that batch wait for it before taking their
//! next work item, which keeps every shard in lockstep with submission.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, PipelineResult};

/// Publishing half, owned by the aggregator.
#[derive(Debug)]
pub struct ReleaseSignal {
    tx: watch::Sender<Option<u64>>,
}

/// Waiting half, one per worker.
#[derive(Debug, Clone)]
pub struct ReleaseWatch {
    rx: watch::Receiver<Option<u64>>,
}

impl ReleaseSignal {
    pub fn new() -> (Self, ReleaseWatch) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, ReleaseWatch { rx })
    }

    /// Mark every batch up to and including `seq_id` as submitted.
    pub fn release(&self, seq_id: u64) {
        self.tx.send_replace(Some(seq_id));
    }

    /// Last released sequence id.
    #[must_use]
    pub fn released(&self) -> Option<u64> {
        *self.tx.borrow()
    }
}

impl ReleaseWatch {
    /// Wait until `seq_id` has been released.
    pub async fn wait_released(
        &mut self,
        seq_id: u64,
        cancel: &CancellationToken,
    ) -> PipelineResult<()> {
        loop {
            let released = *self.rx.borrow_and_update();
            if released.is_some_and(|r| r >= seq_id) {
                return Ok(());
            }

            tokio::select! {
                changed = self.rx.changed() => {
                    // Aggregator gone without releasing this batch.
                    changed.map_err(|_| PipelineError::Aborted)?;
                }
                () = cancel.cancelled() => return Err(PipelineError::Aborted),
            }
        }
    }
}
