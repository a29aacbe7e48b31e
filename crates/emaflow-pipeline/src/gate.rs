//! Sequence gate: admits producers to the shard queues in batch order.
//!
//! The gate holds the next sequence id allowed to enqueue. A producer with
//! batch `k` waits until the gate reads `k`, enqueues to every shard, then
//! advances the gate to `k + 1`. Waiting is notification-driven through a
//! watch channel; no producer polls.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{PipelineError, PipelineResult};

/// Turn-taking gate keyed on batch sequence ids.
#[derive(Debug)]
pub struct SequenceGate {
    tx: watch::Sender<u64>,
}

impl SequenceGate {
    /// Create a gate whose first admitted batch is `first_seq_id`.
    #[must_use]
    pub fn new(first_seq_id: u64) -> Self {
        let (tx, _rx) = watch::channel(first_seq_id);
        Self { tx }
    }

    /// Next sequence id allowed to enqueue.
    #[must_use]
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Wait until `seq_id` is admitted.
    ///
    /// Fails with `OutOfSequence` if the gate has already moved past
    /// `seq_id`, and with `Aborted` if the run is cancelled first.
    pub async fn wait_turn(&self, seq_id: u64, cancel: &CancellationToken) -> PipelineResult<()> {
        let mut rx = self.tx.subscribe();
        loop {
            let next = *rx.borrow_and_update();
            if next == seq_id {
                return Ok(());
            }
            if next > seq_id {
                return Err(PipelineError::OutOfSequence {
                    expected: next,
                    got: seq_id,
                });
            }

            tokio::select! {
                changed = rx.changed() => {
                    // The sender lives as long as the gate.
                    changed.map_err(|_| PipelineError::Aborted)?;
                }
                () = cancel.cancelled() => return Err(PipelineError::Aborted),
            }
        }
    }

    /// Admit the batch after `seq_id`.
    pub fn advance(&self, seq_id: u64) {
        self.tx.send_replace(seq_id + 1);
        trace!(next = seq_id + 1, "Sequence gate advanced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_current_turn_passes_immediately() {
        let gate = SequenceGate::new(5);
        let cancel = CancellationToken::new();
        gate.wait_turn(5, &cancel).await.unwrap();
        assert_eq!(gate.current(), 5);
    }

    #[tokio::test]
    async fn test_waiters_released_in_order() {
        let gate = Arc::new(SequenceGate::new(1));
        let cancel = CancellationToken::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for seq in (1..=4).rev() {
            let gate = gate.clone();
            let cancel = cancel.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                gate.wait_turn(seq, &cancel).await.unwrap();
                order.lock().push(seq);
                gate.advance(seq);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![1, 2, 3, 4]);
        assert_eq!(gate.current(), 5);
    }

    #[tokio::test]
    async fn test_passed_turn_is_out_of_sequence() {
        let gate = SequenceGate::new(1);
        gate.advance(1);
        let err = gate
            .wait_turn(1, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::OutOfSequence {
                expected: 2,
                got: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let gate = Arc::new(SequenceGate::new(1));
        let cancel = CancellationToken::new();

        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.wait_turn(3, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(PipelineError::Aborted)));
    }
}
