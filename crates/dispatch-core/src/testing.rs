//! In-memory collaborators for local development and testing without live
//! coordination infrastructure. Feature-gated behind `test-util` so none
//! of this ships in a production dependency tree.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::queue::{Metadata, QueueProvider};
use crate::store::{ConcurrencyStore, DebounceStore, LockOutcome, RateLimitStore};

fn expired(set_at: Instant, ttl: Duration) -> bool {
    set_at.elapsed() >= ttl
}

/// A record sharing a composite key with others under a concurrency cap.
struct LockRecord {
    set_at: Instant,
}

/// Real TTL/tie-break semantics over a `DashMap`, for scenario tests that
/// need to exercise racing publishers rather than stub out the gate
/// entirely: a race that would push past `limit` breaks deterministically
/// and the loser self-deletes.
#[derive(Default)]
pub struct InMemoryConcurrencyStore {
    locks: DashMap<String, Vec<(String, LockRecord)>>,
}

impl InMemoryConcurrencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConcurrencyStore for InMemoryConcurrencyStore {
    async fn try_set_lock(&self, composite_key: &str, limit: u32) -> Result<LockOutcome, DispatchError> {
        let mut entry = self.locks.entry(composite_key.to_owned()).or_default();
        entry.retain(|(_, rec)| !expired(rec.set_at, Duration::from_secs(3600)));
        if entry.len() as u32 >= limit {
            return Ok(LockOutcome::denied());
        }
        let instance_key = Uuid::new_v4().to_string();
        entry.push((instance_key.clone(), LockRecord { set_at: Instant::now() }));
        Ok(LockOutcome::acquired(instance_key))
    }

    async fn release_lock(&self, composite_key: &str, instance_key: &str) {
        if let Some(mut entry) = self.locks.get_mut(composite_key) {
            entry.retain(|(key, _)| key != instance_key);
        }
    }
}

struct DebounceRecord {
    instance_key: String,
    set_at: Instant,
    ttl: Duration,
}

/// Exactly one logical record per composite key.
#[derive(Default)]
pub struct InMemoryDebounceStore {
    records: DashMap<String, DebounceRecord>,
}

impl InMemoryDebounceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DebounceStore for InMemoryDebounceStore {
    async fn set_reference(&self, composite_key: &str, instance_key: &str, interval: Duration) -> Result<(), DispatchError> {
        self.records.insert(
            composite_key.to_owned(),
            DebounceRecord {
                instance_key: instance_key.to_owned(),
                set_at: Instant::now(),
                ttl: interval * 2,
            },
        );
        Ok(())
    }

    async fn try_remove_own_reference(
        &self,
        composite_key: &str,
        instance_key: &str,
        interval: Duration,
    ) -> Result<bool, DispatchError> {
        match self.records.get(composite_key) {
            Some(record) if expired(record.set_at, record.ttl) => {
                drop(record);
                self.records.remove(composite_key);
                self.set_reference(composite_key, instance_key, interval).await?;
                Ok(true)
            }
            Some(record) if record.instance_key == instance_key => {
                drop(record);
                self.records.remove(composite_key);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                // An absent record is treated as "survives", but the store
                // re-installs a reference so a backlog of queued duplicates
                // doesn't all pass through.
                self.set_reference(composite_key, instance_key, interval).await?;
                Ok(true)
            }
        }
    }
}

struct RateRecord {
    set_at: Instant,
}

/// Rolling-window usage tracked as a list of unexpired timestamps per key.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, Vec<RateRecord>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get_next_available_run_time(
        &self,
        composite_key: &str,
        per_period: u32,
        period: Duration,
    ) -> Result<Option<Duration>, DispatchError> {
        let mut entry = self.windows.entry(composite_key.to_owned()).or_default();
        entry.retain(|rec| !expired(rec.set_at, period));
        if (entry.len() as u32) < per_period {
            entry.push(RateRecord { set_at: Instant::now() });
            return Ok(None);
        }
        let oldest = entry.iter().map(|rec| rec.set_at).min().expect("len >= per_period >= 1");
        let remaining = period.saturating_sub(oldest.elapsed());
        Ok(Some(remaining.max(Duration::from_secs(1))))
    }
}

/// A store that accepts everything unconditionally: no debouncing, no
/// concurrency cap, no rate limit. Useful for running a callable's business
/// logic in isolation without standing up real coordination infrastructure.
#[derive(Default)]
pub struct PassthroughStore;

impl PassthroughStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConcurrencyStore for PassthroughStore {
    async fn try_set_lock(&self, _composite_key: &str, _limit: u32) -> Result<LockOutcome, DispatchError> {
        Ok(LockOutcome::acquired("passthrough"))
    }

    async fn release_lock(&self, _composite_key: &str, _instance_key: &str) {}
}

#[async_trait]
impl DebounceStore for PassthroughStore {
    async fn set_reference(&self, _composite_key: &str, _instance_key: &str, _interval: Duration) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn try_remove_own_reference(
        &self,
        _composite_key: &str,
        _instance_key: &str,
        _interval: Duration,
    ) -> Result<bool, DispatchError> {
        Ok(true)
    }
}

#[async_trait]
impl RateLimitStore for PassthroughStore {
    async fn get_next_available_run_time(
        &self,
        _composite_key: &str,
        _per_period: u32,
        _period: Duration,
    ) -> Result<Option<Duration>, DispatchError> {
        Ok(None)
    }
}

/// Records every enqueue instead of handing frames to real transport.
/// `drain_immediate`/`drain_delayed` let a test assert on what would have
/// been published.
#[derive(Default)]
pub struct InMemoryQueueProvider {
    immediate: Mutex<Vec<(Option<String>, Vec<u8>, Option<Metadata>)>>,
    delayed: Mutex<Vec<(Option<String>, Vec<u8>, Duration, Option<Metadata>)>>,
    bulk: Mutex<Vec<(Option<String>, Vec<Vec<u8>>)>>,
    dlqs: HashMap<String, String>,
}

impl InMemoryQueueProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dlq(mut self, queue_name: impl Into<String>, dlq_name: impl Into<String>) -> Self {
        self.dlqs.insert(queue_name.into(), dlq_name.into());
        self
    }

    pub fn drain_immediate(&self) -> Vec<(Option<String>, Vec<u8>, Option<Metadata>)> {
        std::mem::take(&mut self.immediate.lock().unwrap())
    }

    pub fn drain_delayed(&self) -> Vec<(Option<String>, Vec<u8>, Duration, Option<Metadata>)> {
        std::mem::take(&mut self.delayed.lock().unwrap())
    }

    pub fn drain_bulk(&self) -> Vec<(Option<String>, Vec<Vec<u8>>)> {
        std::mem::take(&mut self.bulk.lock().unwrap())
    }
}

#[async_trait]
impl QueueProvider for InMemoryQueueProvider {
    async fn enqueue(&self, bytes: Vec<u8>, queue_name: Option<&str>, metadata: Option<Metadata>) -> Result<(), DispatchError> {
        self.immediate
            .lock()
            .unwrap()
            .push((queue_name.map(str::to_owned), bytes, metadata));
        Ok(())
    }

    async fn enqueue_delayed(
        &self,
        bytes: Vec<u8>,
        delay: Duration,
        queue_name: Option<&str>,
        metadata: Option<Metadata>,
    ) -> Result<(), DispatchError> {
        self.delayed
            .lock()
            .unwrap()
            .push((queue_name.map(str::to_owned), bytes, delay, metadata));
        Ok(())
    }

    async fn enqueue_bulk(&self, bytes_seq: Vec<Vec<u8>>, queue_name: Option<&str>) -> Result<(), DispatchError> {
        self.bulk.lock().unwrap().push((queue_name.map(str::to_owned), bytes_seq));
        Ok(())
    }

    fn dlq_for(&self, queue_name: &str) -> Option<String> {
        self.dlqs.get(queue_name).cloned()
    }
}
