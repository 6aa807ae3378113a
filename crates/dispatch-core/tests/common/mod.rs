//! Shared fixtures for the integration suite: small `Dispatchable`
//! implementations, one per mixin, each reporting invocations through an
//! `Arc<AtomicUsize>` captured by its registry constructor rather than a
//! process-wide static — tests run concurrently in the same binary and
//! must not share counters.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dispatch_core::{
    ConcurrencyCappedSpec, DebouncedSpec, DispatchError, Dispatchable, InvokeContext, RateLimitedSpec, Registry,
    RepeatedSpec, RepeatedState,
};
use serde_json::Value;

/// Installs a `tracing` subscriber for the current test binary, once.
/// Ignores the "already set" error so every test can call it unconditionally.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

pub const ECHO_TAG: &str = "test.Echo";
pub const DEBOUNCED_TAG: &str = "test.Debounced";
pub const CONCURRENCY_TAG: &str = "test.ConcurrencyCapped";
pub const RATE_LIMITED_TAG: &str = "test.RateLimited";
pub const REPEATED_TAG: &str = "test.Repeated";
pub const FAILING_TAG: &str = "test.Failing";
pub const LOGGED_TAG: &str = "test.Logged";

#[derive(Debug)]
pub struct Echo {
    pub label: String,
    pub invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl Dispatchable for Echo {
    fn type_tag(&self) -> &'static str {
        ECHO_TAG
    }

    fn to_payload(&self) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({ "label": self.label }))
    }

    async fn invoke(&mut self, _cx: &InvokeContext) -> Result<(), DispatchError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn register_echo(registry: &Registry, invocations: Arc<AtomicUsize>) {
    registry.register(ECHO_TAG, move |payload| {
        let label = payload.get("label").and_then(Value::as_str).unwrap_or_default().to_owned();
        Ok(Box::new(Echo {
            label,
            invocations: invocations.clone(),
        }) as Box<dyn Dispatchable>)
    });
}

#[derive(Debug)]
pub struct DebouncedJob {
    pub type_key: String,
    pub interval: Duration,
    pub instance_key: Option<String>,
    pub invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl Dispatchable for DebouncedJob {
    fn type_tag(&self) -> &'static str {
        DEBOUNCED_TAG
    }

    fn to_payload(&self) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({
            "typeKey": self.type_key,
            "intervalMs": self.interval.as_millis() as u64,
            "instanceKey": self.instance_key,
        }))
    }

    async fn invoke(&mut self, _cx: &InvokeContext) -> Result<(), DispatchError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn debounced(&self) -> Option<DebouncedSpec> {
        let mut spec = DebouncedSpec::new(self.type_key.clone(), self.interval);
        spec.instance_key = self.instance_key.clone();
        Some(spec)
    }

    fn set_debounce_instance_key(&mut self, key: String) {
        self.instance_key = Some(key);
    }
}

pub fn register_debounced(registry: &Registry, invocations: Arc<AtomicUsize>) {
    registry.register(DEBOUNCED_TAG, move |payload| {
        let type_key = payload.get("typeKey").and_then(Value::as_str).unwrap_or_default().to_owned();
        let interval_ms = payload.get("intervalMs").and_then(Value::as_u64).unwrap_or(0);
        let instance_key = payload.get("instanceKey").and_then(Value::as_str).map(str::to_owned);
        Ok(Box::new(DebouncedJob {
            type_key,
            interval: Duration::from_millis(interval_ms),
            instance_key,
            invocations: invocations.clone(),
        }) as Box<dyn Dispatchable>)
    });
}

#[derive(Debug)]
pub struct ConcurrencyCappedJob {
    pub type_key: String,
    pub limit: u32,
    pub invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl Dispatchable for ConcurrencyCappedJob {
    fn type_tag(&self) -> &'static str {
        CONCURRENCY_TAG
    }

    fn to_payload(&self) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({ "typeKey": self.type_key, "limit": self.limit }))
    }

    async fn invoke(&mut self, _cx: &InvokeContext) -> Result<(), DispatchError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn concurrency_capped(&self) -> Option<ConcurrencyCappedSpec> {
        Some(ConcurrencyCappedSpec::new(self.type_key.clone(), self.limit))
    }
}

pub fn register_concurrency_capped(registry: &Registry, invocations: Arc<AtomicUsize>) {
    registry.register(CONCURRENCY_TAG, move |payload| {
        let type_key = payload.get("typeKey").and_then(Value::as_str).unwrap_or_default().to_owned();
        let limit = payload.get("limit").and_then(Value::as_u64).unwrap_or(1) as u32;
        Ok(Box::new(ConcurrencyCappedJob {
            type_key,
            limit,
            invocations: invocations.clone(),
        }) as Box<dyn Dispatchable>)
    });
}

#[derive(Debug)]
pub struct RateLimitedJob {
    pub type_key: String,
    pub per_period: u32,
    pub period: Duration,
    pub invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl Dispatchable for RateLimitedJob {
    fn type_tag(&self) -> &'static str {
        RATE_LIMITED_TAG
    }

    fn to_payload(&self) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({
            "typeKey": self.type_key,
            "perPeriod": self.per_period,
            "periodMs": self.period.as_millis() as u64,
        }))
    }

    async fn invoke(&mut self, _cx: &InvokeContext) -> Result<(), DispatchError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rate_limited(&self) -> Option<RateLimitedSpec> {
        Some(RateLimitedSpec::new(self.type_key.clone(), self.per_period, self.period))
    }
}

pub fn register_rate_limited(registry: &Registry, invocations: Arc<AtomicUsize>) {
    registry.register(RATE_LIMITED_TAG, move |payload| {
        let type_key = payload.get("typeKey").and_then(Value::as_str).unwrap_or_default().to_owned();
        let per_period = payload.get("perPeriod").and_then(Value::as_u64).unwrap_or(1) as u32;
        let period_ms = payload.get("periodMs").and_then(Value::as_u64).unwrap_or(1000);
        Ok(Box::new(RateLimitedJob {
            type_key,
            per_period,
            period: Duration::from_millis(period_ms),
            invocations: invocations.clone(),
        }) as Box<dyn Dispatchable>)
    });
}

#[derive(Debug)]
pub struct RepeatedJob {
    pub max_calls: u32,
    pub interval: Duration,
    pub state: RepeatedState,
    pub invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl Dispatchable for RepeatedJob {
    fn type_tag(&self) -> &'static str {
        REPEATED_TAG
    }

    fn to_payload(&self) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({
            "maxCalls": self.max_calls,
            "intervalMs": self.interval.as_millis() as u64,
            "currentCall": self.state.current_call,
            "shouldContinue": self.state.should_continue,
        }))
    }

    async fn invoke(&mut self, _cx: &InvokeContext) -> Result<(), DispatchError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn repeated(&self) -> Option<RepeatedSpec> {
        Some(RepeatedSpec::new(self.max_calls, self.interval))
    }

    fn repeated_state_mut(&mut self) -> Option<&mut RepeatedState> {
        Some(&mut self.state)
    }
}

pub fn register_repeated(registry: &Registry, invocations: Arc<AtomicUsize>) {
    registry.register(REPEATED_TAG, move |payload| {
        let max_calls = payload.get("maxCalls").and_then(Value::as_u64).unwrap_or(1) as u32;
        let interval_ms = payload.get("intervalMs").and_then(Value::as_u64).unwrap_or(0);
        let current_call = payload.get("currentCall").and_then(Value::as_u64).unwrap_or(0) as u32;
        let should_continue = payload.get("shouldContinue").and_then(Value::as_bool).unwrap_or(true);
        Ok(Box::new(RepeatedJob {
            max_calls,
            interval: Duration::from_millis(interval_ms),
            state: RepeatedState::new(current_call, should_continue),
            invocations: invocations.clone(),
        }) as Box<dyn Dispatchable>)
    });
}

#[derive(Debug)]
pub struct FailingJob {
    pub no_retry: bool,
    pub on_error_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Dispatchable for FailingJob {
    fn type_tag(&self) -> &'static str {
        FAILING_TAG
    }

    fn to_payload(&self) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({ "noRetry": self.no_retry }))
    }

    async fn invoke(&mut self, _cx: &InvokeContext) -> Result<(), DispatchError> {
        if self.no_retry {
            Err(DispatchError::user_no_retry("business rule violated"))
        } else {
            Err(DispatchError::user("downstream call failed"))
        }
    }

    async fn on_error(&mut self, _err: &DispatchError, _cx: &InvokeContext) -> Result<(), DispatchError> {
        self.on_error_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn register_failing(registry: &Registry, on_error_calls: Arc<AtomicUsize>) {
    registry.register(FAILING_TAG, move |payload| {
        let no_retry = payload.get("noRetry").and_then(Value::as_bool).unwrap_or(false);
        Ok(Box::new(FailingJob {
            no_retry,
            on_error_calls: on_error_calls.clone(),
        }) as Box<dyn Dispatchable>)
    });
}

#[derive(Debug)]
pub struct LoggedJob {
    pub invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl Dispatchable for LoggedJob {
    fn type_tag(&self) -> &'static str {
        LOGGED_TAG
    }

    fn to_payload(&self) -> Result<Value, DispatchError> {
        Ok(serde_json::json!({}))
    }

    async fn invoke(&mut self, _cx: &InvokeContext) -> Result<(), DispatchError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn logged(&self) -> bool {
        true
    }
}

pub fn register_logged(registry: &Registry, invocations: Arc<AtomicUsize>) {
    registry.register(LOGGED_TAG, move |_payload| {
        Ok(Box::new(LoggedJob {
            invocations: invocations.clone(),
        }) as Box<dyn Dispatchable>)
    });
}
