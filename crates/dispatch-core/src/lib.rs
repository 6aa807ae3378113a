//! A transport-agnostic dispatch pipeline for queued background work.
//!
//! A unit of work ("callable") serializes to a `<typeTag>::<payload>` wire
//! frame and may declare any combination of six capabilities — logging,
//! dependency injection, debouncing, rate limiting, concurrency capping,
//! and repetition — without the dispatcher ever downcasting a trait object
//! to find out which. [`wire::Dispatchable`] is the single trait a callable
//! implements; [`dispatcher::Dispatcher`] runs the twelve-step pipeline
//! that decodes a frame, enforces whichever capabilities it declares, and
//! invokes it.
//!
//! This crate owns the pipeline and the contracts ([`store`], [`queue`])
//! an embedding host must satisfy — it does not ship a queue transport or
//! a production coordination store. See [`testing`] (behind the
//! `test-util` feature) for in-memory stand-ins suitable for tests.

pub mod capability;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod publisher;
pub mod queue;
pub mod retry;
pub mod store;
pub mod validate;
pub mod wire;

#[cfg(feature = "test-util")]
pub mod testing;

pub use capability::{ConcurrencyCappedSpec, DebouncedSpec, RateLimitedSpec, RepeatedSpec, RepeatedState};
pub use config::{DispatcherConfig, RetryConfig};
pub use context::{DispatchContext, DispatchLogger, ServiceLocator};
pub use dispatcher::{ConsumerHooks, DispatchOutcome, DispatchRequest, Dispatcher, NoopHooks};
pub use error::{CallableError, DispatchError};
pub use publisher::{PublishOptions, Publisher};
pub use queue::{Metadata, QueueProvider};
pub use retry::{RetryOutcome, RetryPolicy};
pub use store::{composite_key, ConcurrencyStore, DebounceStore, LockOutcome, RateLimitStore};
pub use wire::{Dispatchable, InvokeContext, Registry};
