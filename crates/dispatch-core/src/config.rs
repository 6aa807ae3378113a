//! Policy knobs for the dispatcher and retry shell. Plain struct with a
//! `Default` — this crate is embedded in a host, so it has no file-based
//! config layer of its own; the hosting runtime that owns batching and
//! draining is an external collaborator with its own config system.

use std::time::Duration;

/// The fixed, small delay used to republish a work item whose concurrency
/// lock couldn't be acquired.
pub const DEFAULT_CONCURRENCY_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The retry ladder's default intervals.
pub fn default_retry_intervals() -> Vec<Duration> {
    vec![
        Duration::from_secs(15),
        Duration::from_secs(60),
        Duration::from_secs(120),
        Duration::from_secs(240),
    ]
}

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Delay used to republish a message that lost the concurrency-lock race.
    pub concurrency_retry_delay: Duration,
    /// Upper bound enforced on delayed publishes.
    pub max_queue_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency_retry_delay: DEFAULT_CONCURRENCY_RETRY_DELAY,
            max_queue_delay: crate::queue::DEFAULT_MAX_QUEUE_DELAY,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// The fixed interval ladder a failed dispatch is retried against.
    pub intervals: Vec<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            intervals: default_retry_intervals(),
        }
    }
}
