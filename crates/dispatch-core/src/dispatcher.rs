//! The consumer dispatch pipeline: decode, gate, invoke, and finalize one
//! wire frame. This is the one place all the other modules come together,
//! mirroring how a data-plane handler chain is assembled from discrete
//! stages elsewhere in this codebase's lineage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DispatcherConfig;
use crate::context::DispatchContext;
use crate::error::{CallableError, DispatchError};
use crate::queue::{check_delay, Metadata, QueueProvider};
use crate::store::{composite_key, ConcurrencyStore, DebounceStore, RateLimitStore};
use crate::validate::{validate_concurrency_capped, validate_debounced, validate_rate_limited, validate_repeated};
use crate::wire::{Dispatchable, InvokeContext, Registry};

/// One decoded wire frame plus the envelope the queue handed it back with.
pub struct DispatchRequest {
    pub bytes: Vec<u8>,
    pub queue_name: String,
    pub metadata: Metadata,
}

impl DispatchRequest {
    pub fn new(bytes: Vec<u8>, queue_name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            bytes,
            queue_name: queue_name.into(),
            metadata,
        }
    }
}

/// How a single dispatch concluded, when it didn't error.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Ran `invoke` (and, for `Repeated`, its terminal hook) to completion.
    Completed,
    /// A `Debounced` instance was superseded; discarded without invoking.
    Debounced,
    /// Republished instead of invoking this time — a concurrency cap or
    /// rate limit wasn't satisfied, or a `Repeated` callable asked to run
    /// again. `delay` is how far out it was requeued.
    Republished { delay: Duration },
}

/// Host-supplied observation points around a dispatch: pre-call, post-call,
/// and finalize. All three default to no-ops so a host only overrides what
/// it needs — analogous to the middleware-chain hooks this pipeline's shape
/// is drawn from, minus the ability to short-circuit the chain itself.
#[async_trait]
pub trait ConsumerHooks: Send + Sync {
    async fn pre_call(&self, _callable: &dyn Dispatchable, _queue_name: &str) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn post_call(&self, _callable: &dyn Dispatchable, _queue_name: &str) -> Result<(), DispatchError> {
        Ok(())
    }

    /// Runs unconditionally, even when every earlier stage aborted.
    /// `callable` is `None` only when decoding itself failed. An error here
    /// is logged and swallowed unless the dispatch would otherwise have
    /// succeeded, in which case it becomes the error.
    async fn finalize(&self, _callable: Option<&dyn Dispatchable>, _queue_name: &str) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// No-op hook set, for hosts that don't need any.
#[derive(Default)]
pub struct NoopHooks;

impl ConsumerHooks for NoopHooks {}

pub struct Dispatcher {
    registry: Arc<Registry>,
    queue: Arc<dyn QueueProvider>,
    concurrency_store: Option<Arc<dyn ConcurrencyStore>>,
    debounce_store: Option<Arc<dyn DebounceStore>>,
    rate_limit_store: Option<Arc<dyn RateLimitStore>>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, queue: Arc<dyn QueueProvider>) -> Self {
        Self {
            registry,
            queue,
            concurrency_store: None,
            debounce_store: None,
            rate_limit_store: None,
            config: DispatcherConfig::default(),
        }
    }

    pub fn with_concurrency_store(mut self, store: Arc<dyn ConcurrencyStore>) -> Self {
        self.concurrency_store = Some(store);
        self
    }

    pub fn with_debounce_store(mut self, store: Arc<dyn DebounceStore>) -> Self {
        self.debounce_store = Some(store);
        self
    }

    pub fn with_rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limit_store = Some(store);
        self
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs the full twelve-step pipeline for one wire frame.
    pub async fn dispatch(
        &self,
        req: DispatchRequest,
        hooks: &dyn ConsumerHooks,
        ctx: &DispatchContext,
    ) -> Result<DispatchOutcome, CallableError> {
        // Step 1: decode. No callable exists yet, so there is no `onError`
        // to run; finalize still fires (step 12 is unconditional).
        let mut callable = match self.registry.decode(&req.bytes) {
            Ok(c) => c,
            Err(err) => {
                if let Err(finalize_err) = hooks.finalize(None, &req.queue_name).await {
                    tracing::warn!(error = %finalize_err, "finalize hook failed after a malformed frame");
                }
                return Err(CallableError::new(err, None));
            }
        };

        // Step 2: validate `Repeated` up front, before any gate runs. This
        // is outside the range of steps that trigger `onError`, but
        // finalize still runs.
        if let Some(repeated_spec) = callable.repeated() {
            let current_call = callable.repeated_state_mut().map(|s| s.current_call);
            if let Err(err) = validate_repeated(&repeated_spec, current_call) {
                if let Err(finalize_err) = hooks.finalize(Some(callable.as_ref()), &req.queue_name).await {
                    tracing::warn!(error = %finalize_err, "finalize hook failed after a Repeated validation error");
                }
                return Err(CallableError::new(err, Some(callable)));
            }
        }

        let mut held_lock: Option<(String, String)> = None;
        let body_result = self
            .run_gated_invoke(callable.as_mut(), &req, hooks, ctx, &mut held_lock)
            .await;

        // Step 11: errors from steps 3–10 get a chance at `onError` before
        // being wrapped. Early-return outcomes (debounced/republished) are
        // not errors and skip this.
        let body_result = if let Err(err) = body_result {
            let invoke_cx = InvokeContext::new(req.queue_name.clone());
            if let Err(on_error_err) = callable.on_error(&err, &invoke_cx).await {
                tracing::warn!(error = %on_error_err, "callable on_error raised; the original error still propagates");
            }
            Err(err)
        } else {
            body_result
        };

        // Step 12: finalize, unconditionally — lock release first, then the hook.
        if let Some((key, instance_key)) = held_lock.take() {
            if let Some(store) = &self.concurrency_store {
                store.release_lock(&key, &instance_key).await;
            }
        }
        let finalize_result = hooks.finalize(Some(callable.as_ref()), &req.queue_name).await;

        match body_result {
            Ok(outcome) => match finalize_result {
                Ok(()) => Ok(outcome),
                Err(finalize_err) => Err(CallableError::new(finalize_err, Some(callable))),
            },
            Err(err) => {
                if let Err(finalize_err) = finalize_result {
                    tracing::warn!(error = %finalize_err, "finalize hook failed while handling a prior error");
                }
                Err(CallableError::new(err, Some(callable)))
            }
        }
    }

    /// Steps 3–10: the debounce/concurrency/rate-limit gates, logger and
    /// dependency injection, the pre/post-call hooks, the invocation
    /// itself, and the `Repeated` branch. Returns as soon as any gate
    /// decides the message shouldn't be invoked this time.
    async fn run_gated_invoke(
        &self,
        callable: &mut dyn Dispatchable,
        req: &DispatchRequest,
        hooks: &dyn ConsumerHooks,
        ctx: &DispatchContext,
        held_lock: &mut Option<(String, String)>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let full_tag = callable.type_tag();

        // Step 3: debounce gate.
        if let Some(mut spec) = callable.debounced() {
            validate_debounced(&spec)?;
            let store = self.debounce_store.as_ref().ok_or_else(|| {
                DispatchError::missing_capability("Debounced callable dispatched without a debounce store in context")
            })?;
            let instance_key = spec.instance_key.take().ok_or_else(|| {
                DispatchError::validation("Debounced callable arrived on the wire without an instance key")
            })?;
            let key = composite_key(full_tag, &spec.type_key);
            let survives = store.try_remove_own_reference(&key, &instance_key, spec.interval).await?;
            if !survives {
                tracing::info!(type_tag = full_tag, type_key = %spec.type_key, "debounced instance superseded; discarding");
                return Ok(DispatchOutcome::Debounced);
            }
        }

        // Step 4: concurrency gate.
        if let Some(spec) = callable.concurrency_capped() {
            validate_concurrency_capped(&spec)?;
            let store = self.concurrency_store.as_ref().ok_or_else(|| {
                DispatchError::missing_capability(
                    "ConcurrencyCapped callable dispatched without a concurrency store in context",
                )
            })?;
            let key = composite_key(full_tag, &spec.type_key);
            let lock = store.try_set_lock(&key, spec.limit).await?;
            if !lock.got_lock {
                let delay = self.config.concurrency_retry_delay;
                tracing::info!(type_tag = full_tag, type_key = %spec.type_key, ?delay, "concurrency cap reached; republishing");
                self.republish_same(callable, req, delay).await?;
                return Ok(DispatchOutcome::Republished { delay });
            }
            let instance_key = lock
                .instance_key
                .expect("ConcurrencyStore::try_set_lock must set instance_key when got_lock is true");
            *held_lock = Some((key, instance_key));
        }

        // Step 5: rate-limit gate.
        if let Some(spec) = callable.rate_limited() {
            validate_rate_limited(&spec)?;
            let store = self.rate_limit_store.as_ref().ok_or_else(|| {
                DispatchError::missing_capability(
                    "RateLimited callable dispatched without a rate-limit store in context",
                )
            })?;
            let key = composite_key(full_tag, &spec.type_key);
            if let Some(delay) = store.get_next_available_run_time(&key, spec.per_period, spec.period).await? {
                tracing::info!(type_tag = full_tag, type_key = %spec.type_key, ?delay, "rate limit reached; republishing");
                self.republish_same(callable, req, delay).await?;
                return Ok(DispatchOutcome::Republished { delay });
            }
        }

        // Step 6: logging init.
        if callable.logged() {
            let logger = ctx
                .logger
                .clone()
                .ok_or_else(|| DispatchError::missing_capability("Logged callable dispatched without a logger in context"))?;
            callable.inject_logger(logger);
        }

        // Step 7: dependency init.
        if callable.dependency_bound() {
            let services = ctx.services.clone().ok_or_else(|| {
                DispatchError::missing_capability("DependencyBound callable dispatched without a service locator in context")
            })?;
            callable.inject_dependencies(services);
        }

        let invoke_cx = InvokeContext::new(req.queue_name.clone());

        // Step 8: pre-call hook.
        hooks.pre_call(&*callable, &req.queue_name).await?;

        // Step 9: invoke.
        callable.invoke(&invoke_cx).await?;

        // Step 10: post-call hook, then the `Repeated` branch.
        hooks.post_call(&*callable, &req.queue_name).await?;

        if let Some(repeated_spec) = callable.repeated() {
            let should_continue = callable
                .repeated_state_mut()
                .ok_or_else(|| DispatchError::validation("Repeated callable has no repeated_state_mut"))?
                .should_continue;

            if !should_continue {
                callable.completed(false, &invoke_cx).await?;
                return Ok(DispatchOutcome::Completed);
            }

            let reached_max = {
                let state = callable
                    .repeated_state_mut()
                    .expect("checked Some above");
                state.current_call += 1;
                state.current_call >= repeated_spec.max_calls
            };

            if reached_max {
                callable.completed(true, &invoke_cx).await?;
                return Ok(DispatchOutcome::Completed);
            }

            let delay = repeated_spec.interval;
            self.republish_same(callable, req, delay).await?;
            return Ok(DispatchOutcome::Republished { delay });
        }

        Ok(DispatchOutcome::Completed)
    }

    async fn republish_same(
        &self,
        callable: &dyn Dispatchable,
        req: &DispatchRequest,
        delay: Duration,
    ) -> Result<(), DispatchError> {
        check_delay(delay, self.config.max_queue_delay)?;
        let bytes = self.registry.encode(callable)?;
        self.queue
            .enqueue_delayed(bytes, delay, Some(&req.queue_name), Some(req.metadata.clone()))
            .await
    }
}
