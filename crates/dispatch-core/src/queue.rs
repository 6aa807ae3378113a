//! The queue provider contract and the metadata bag that travels alongside
//! every wire frame.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DispatchError;

/// Queue providers may cap the maximum delay on a delayed publish. Exposed
/// so hosts that enforce it can share one constant with callers building
/// delayed publishes.
pub const DEFAULT_MAX_QUEUE_DELAY: Duration = Duration::from_secs(900);

/// String-to-string metadata carried alongside a wire frame. A thin
/// newtype over the map so the two reserved keys get typed accessors
/// instead of every caller hand-formatting them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata(HashMap<String, String>);

const RETRY_COUNT_KEY: &str = "callable-retry-count";
const NO_RETRY_KEY: &str = "callable-no-retry";

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// At most one `retry-count` entry; absent means zero.
    pub fn retry_count(&self) -> u32 {
        self.get(RETRY_COUNT_KEY)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.insert(RETRY_COUNT_KEY, count.to_string());
        self
    }

    pub fn no_retry(&self) -> bool {
        self.get(NO_RETRY_KEY) == Some("true")
    }

    pub fn with_no_retry(mut self, no_retry: bool) -> Self {
        if no_retry {
            self.insert(NO_RETRY_KEY, "true");
        } else {
            self.0.remove(NO_RETRY_KEY);
        }
        self
    }
}

impl From<HashMap<String, String>> for Metadata {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

/// External transport collaborator. The core crate specifies the contract
/// only — cloud-queue vs. in-process-loop implementations are out of scope.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    async fn enqueue(
        &self,
        bytes: Vec<u8>,
        queue_name: Option<&str>,
        metadata: Option<Metadata>,
    ) -> Result<(), DispatchError>;

    async fn enqueue_delayed(
        &self,
        bytes: Vec<u8>,
        delay: Duration,
        queue_name: Option<&str>,
        metadata: Option<Metadata>,
    ) -> Result<(), DispatchError>;

    async fn enqueue_bulk(&self, bytes_seq: Vec<Vec<u8>>, queue_name: Option<&str>) -> Result<(), DispatchError>;

    /// Name of the dead-letter queue for `queue_name`, if the provider
    /// routes one. `None` means "log and drop".
    fn dlq_for(&self, _queue_name: &str) -> Option<String> {
        None
    }
}

/// Checked against `DEFAULT_MAX_QUEUE_DELAY` (or a host-supplied cap) before
/// a delayed publish is handed to the provider; providers may additionally
/// enforce their own cap.
pub fn check_delay(delay: Duration, max: Duration) -> Result<(), DispatchError> {
    if delay > max {
        return Err(DispatchError::transport(format!(
            "requested delay {delay:?} exceeds the maximum of {max:?}"
        )));
    }
    Ok(())
}
