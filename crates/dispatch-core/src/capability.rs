//! The capability mixins a callable may declare: debounce, rate limiting,
//! concurrency capping, and repetition.
//!
//! These are plain data — not marker traits a dispatcher has to downcast
//! to. `Dispatchable` (in `wire.rs`) exposes one accessor per mixin that
//! defaults to "not declared"; a concrete callable overrides only the ones
//! it wants. This is an explicit capability set on the callable descriptor
//! rather than interface detection, so dispatch never needs to downcast a
//! trait object to find out what a callable supports.

use std::time::Duration;

/// `Debounced.typeKey`/`interval` plus the publisher-assigned instance key
/// that travels on the wire so the consumer can tell a superseded instance
/// from the current one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebouncedSpec {
    pub type_key: String,
    pub interval: Duration,
    /// `None` until `Publisher::publish` assigns a fresh one; always `Some`
    /// by the time a dispatcher sees it (decode populates it from the
    /// wire payload).
    pub instance_key: Option<String>,
}

impl DebouncedSpec {
    pub fn new(type_key: impl Into<String>, interval: Duration) -> Self {
        Self {
            type_key: type_key.into(),
            interval,
            instance_key: None,
        }
    }
}

/// `RateLimited.typeKey`/`perPeriod`/`period`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitedSpec {
    pub type_key: String,
    pub per_period: u32,
    pub period: Duration,
}

impl RateLimitedSpec {
    pub fn new(type_key: impl Into<String>, per_period: u32, period: Duration) -> Self {
        Self {
            type_key: type_key.into(),
            per_period,
            period,
        }
    }
}

/// `ConcurrencyCapped.typeKey`/`limit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcurrencyCappedSpec {
    pub type_key: String,
    pub limit: u32,
}

impl ConcurrencyCappedSpec {
    pub fn new(type_key: impl Into<String>, limit: u32) -> Self {
        Self {
            type_key: type_key.into(),
            limit,
        }
    }
}

/// `Repeated.maxCalls`/`interval`, the declared parameters. `currentCall`
/// and `shouldContinue` live on the callable itself (`RepeatedState`)
/// because the dispatcher mutates them between `invoke` and republish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatedSpec {
    pub max_calls: u32,
    pub interval: Duration,
}

impl RepeatedSpec {
    pub fn new(max_calls: u32, interval: Duration) -> Self {
        Self {
            max_calls,
            interval,
        }
    }
}

/// The mutable half of `Repeated`: `currentCall` and `shouldContinue`.
/// `Dispatchable::repeated_state_mut` hands the dispatcher a `&mut` onto
/// whatever field the concrete callable uses to track this, so the
/// mutation the dispatcher performs (bumping `current_call`) is visible
/// on the object it goes on to republish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatedState {
    pub current_call: u32,
    pub should_continue: bool,
}

impl RepeatedState {
    pub fn new(current_call: u32, should_continue: bool) -> Self {
        Self {
            current_call,
            should_continue,
        }
    }
}
