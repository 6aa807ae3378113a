//! Retry/DLQ shell: what happens to a `CallableError` after the pipeline
//! gives up on a message.

use std::sync::Arc;

use crate::config::RetryConfig;
use crate::error::{CallableError, DispatchError};
use crate::queue::{Metadata, QueueProvider};

/// What [`RetryPolicy::handle`] did with a failed dispatch.
#[derive(Debug)]
pub enum RetryOutcome {
    /// Republished to the original queue with the next interval and a
    /// bumped retry count.
    Retried { delay_secs: u64, retry_count: u32 },
    /// Routed to the dead-letter queue the provider named for this queue.
    DeadLettered { dlq_name: String },
    /// No DLQ is configured for this queue; the failure was logged and the
    /// message dropped.
    Dropped,
}

/// Applies the fixed interval ladder to a `CallableError`: malformed
/// frames, errors tagged no-retry, and messages whose metadata carries
/// the `callable-no-retry` marker all go straight to the DLQ; everything
/// else is republished until the ladder is exhausted.
pub struct RetryPolicy {
    queue: Arc<dyn QueueProvider>,
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(queue: Arc<dyn QueueProvider>, config: RetryConfig) -> Self {
        Self { queue, config }
    }

    /// `queue_name` is the queue the failing message came from; `bytes` is
    /// its original (still-encoded) frame and `metadata` its envelope.
    pub async fn handle(
        &self,
        err: &CallableError,
        queue_name: &str,
        bytes: Vec<u8>,
        metadata: Metadata,
    ) -> Result<RetryOutcome, DispatchError> {
        if err.error.is_malformed_frame() || err.error.is_no_retry() || metadata.no_retry() {
            return self.dead_letter(queue_name, bytes).await;
        }

        let retry_count = metadata.retry_count();
        let intervals = &self.config.intervals;
        let Some(delay) = intervals.get(retry_count as usize) else {
            return self.dead_letter(queue_name, bytes).await;
        };

        let next_metadata = metadata.with_retry_count(retry_count + 1);
        self.queue
            .enqueue_delayed(bytes, *delay, Some(queue_name), Some(next_metadata))
            .await?;
        Ok(RetryOutcome::Retried {
            delay_secs: delay.as_secs(),
            retry_count: retry_count + 1,
        })
    }

    async fn dead_letter(&self, queue_name: &str, bytes: Vec<u8>) -> Result<RetryOutcome, DispatchError> {
        match self.queue.dlq_for(queue_name) {
            Some(dlq_name) => {
                self.queue.enqueue(bytes, Some(&dlq_name), None).await?;
                Ok(RetryOutcome::DeadLettered { dlq_name })
            }
            None => {
                tracing::warn!(queue = queue_name, "no dead-letter queue configured; dropping message");
                Ok(RetryOutcome::Dropped)
            }
        }
    }
}
