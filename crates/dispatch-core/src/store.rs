//! Coordination-store contracts. External, linearizable key-value layers
//! the dispatcher consults; this crate specifies the contract only, not
//! an implementation (a passthrough in-memory variant lives in `testing`
//! behind the `test-util` feature).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DispatchError;

/// Composite key namespacing every coordination record by both the
/// registered type tag and the user-chosen key, so two distinct callable
/// types sharing a `typeKey` never collide.
pub fn composite_key(full_type_tag: &str, user_type_key: &str) -> String {
    format!("{full_type_tag}+{user_type_key}")
}

/// Result of [`ConcurrencyStore::try_set_lock`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockOutcome {
    pub got_lock: bool,
    /// Set iff `got_lock` — the record's identity, needed later to release it.
    pub instance_key: Option<String>,
}

impl LockOutcome {
    pub fn acquired(instance_key: impl Into<String>) -> Self {
        Self {
            got_lock: true,
            instance_key: Some(instance_key.into()),
        }
    }

    pub fn denied() -> Self {
        Self {
            got_lock: false,
            instance_key: None,
        }
    }
}

/// Concurrency-lock records. At most `limit` unexpired records may share
/// `composite_key` at any instant.
#[async_trait]
pub trait ConcurrencyStore: Send + Sync {
    /// Atomically verifies fewer than `limit` unexpired records share
    /// `composite_key`, then inserts a new one with a fresh instance key.
    /// Implementations racing past `limit` must break ties deterministically
    /// (e.g. by `(set_at, instance_key)`) and self-delete the losers.
    async fn try_set_lock(&self, composite_key: &str, limit: u32) -> Result<LockOutcome, DispatchError>;

    /// Best-effort deletion; failures are tolerated — expiration is the
    /// ultimate cleanup.
    async fn release_lock(&self, composite_key: &str, instance_key: &str);
}

/// Debounce records. Exactly one logical record per `composite_key` at
/// any time; the latest published instance wins.
#[async_trait]
pub trait DebounceStore: Send + Sync {
    /// Upsert the single logical record for `composite_key`, expiring no
    /// sooner than `2 * interval`.
    async fn set_reference(
        &self,
        composite_key: &str,
        instance_key: &str,
        interval: Duration,
    ) -> Result<(), DispatchError>;

    /// Attempts to delete the record iff its current instance key equals
    /// `instance_key`. Returns `true` if removed, or if no record was
    /// present — in the absent case the store MUST re-install a reference
    /// so a backlog of queued messages doesn't all proceed. Returns `false`
    /// if a different instance key is present, meaning this message has
    /// been superseded.
    async fn try_remove_own_reference(
        &self,
        composite_key: &str,
        instance_key: &str,
        interval: Duration,
    ) -> Result<bool, DispatchError>;
}

/// Rate-limit records. The count of unexpired records for a
/// `composite_key` is the rolling-window usage.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Returns `None` iff fewer than `per_period` unexpired records share
    /// `composite_key`, atomically inserting a new one with expiration
    /// `period` in that case. Otherwise returns the delay until the oldest
    /// record expires, computed as `period - (now - oldest.set_at)`,
    /// lower-bounded to one second. Implementations racing past
    /// `per_period` must break ties deterministically; losers self-delete
    /// and return a delay.
    async fn get_next_available_run_time(
        &self,
        composite_key: &str,
        per_period: u32,
        period: Duration,
    ) -> Result<Option<Duration>, DispatchError>;
}
