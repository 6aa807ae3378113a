//! Wire codec and type registry.
//!
//! A frame is `<typeTag>::<payload>`. `typeTag` resolves through the
//! process-wide [`Registry`] to a constructor; the payload hydrates a
//! concrete type that implements [`Dispatchable`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::capability::{ConcurrencyCappedSpec, DebouncedSpec, RateLimitedSpec, RepeatedSpec, RepeatedState};
use crate::context::{DispatchLogger, ServiceLocator};
use crate::error::DispatchError;

const FRAME_DELIMITER: &str = "::";

/// A registered unit whose serialized form carries its own dispatch
/// identity (glossary: "Callable"). `Invocable` plus zero or more mixins —
/// the mixins are the default-`None`/`false` accessors below rather than
/// separate marker traits, so dispatch never needs to downcast a trait
/// object to find out what a callable declares.
#[async_trait]
pub trait Dispatchable: Send + Sync + fmt::Debug {
    /// The registry-resolvable string every wire frame is prefixed with.
    fn type_tag(&self) -> &'static str;

    /// Field-elided, camelCase JSON payload. Concrete types get this by
    /// deriving `Serialize` with `rename_all = "camelCase"` and
    /// `skip_serializing_if`/`#[serde(skip)]` on default-valued and
    /// mixin-injected fields, then calling `serde_json::to_value(self)`.
    fn to_payload(&self) -> Result<serde_json::Value, DispatchError>;

    /// The user-visible work: exposes `invoke() -> completion`.
    async fn invoke(&mut self, cx: &InvokeContext) -> Result<(), DispatchError>;

    /// Default no-op.
    async fn on_error(&mut self, _err: &DispatchError, _cx: &InvokeContext) -> Result<(), DispatchError> {
        Ok(())
    }

    /// `Repeated`'s terminal hook. Default no-op.
    async fn completed(&mut self, _reached_max: bool, _cx: &InvokeContext) -> Result<(), DispatchError> {
        Ok(())
    }

    /// `Logged` mixin declared.
    fn logged(&self) -> bool {
        false
    }

    /// Dispatcher calls this once a logger is available. Never serialized
    /// back — concrete types keep the slot `#[serde(skip)]`.
    fn inject_logger(&mut self, _logger: DispatchLogger) {}

    /// `DependencyBound` mixin declared.
    fn dependency_bound(&self) -> bool {
        false
    }

    /// Dispatcher calls this once a service locator is available. Fields
    /// resolved through it must stay `#[serde(skip)]`.
    fn inject_dependencies(&mut self, _services: Arc<dyn ServiceLocator>) {}

    /// `Debounced` mixin declared parameters, if any.
    fn debounced(&self) -> Option<DebouncedSpec> {
        None
    }

    /// Publisher calls this to stamp the fresh, single-use instance key
    /// before the payload is serialized.
    fn set_debounce_instance_key(&mut self, _key: String) {}

    /// `RateLimited` mixin declared parameters, if any.
    fn rate_limited(&self) -> Option<RateLimitedSpec> {
        None
    }

    /// `ConcurrencyCapped` mixin declared parameters, if any.
    fn concurrency_capped(&self) -> Option<ConcurrencyCappedSpec> {
        None
    }

    /// `Repeated` mixin declared parameters, if any.
    fn repeated(&self) -> Option<RepeatedSpec> {
        None
    }

    /// Mutable access to `currentCall`/`shouldContinue` for callables that
    /// declare `Repeated`. Must return `Some` whenever `repeated()` does.
    fn repeated_state_mut(&mut self) -> Option<&mut RepeatedState> {
        None
    }
}

/// Arguments threaded into `invoke`/`on_error`/`completed`: the queue a
/// message arrived on plus whatever the host attached for this call.
#[derive(Clone, Debug)]
pub struct InvokeContext {
    pub queue_name: String,
}

impl InvokeContext {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
        }
    }
}

type Constructor = Arc<dyn Fn(serde_json::Value) -> Result<Box<dyn Dispatchable>, DispatchError> + Send + Sync>;

/// Maps type tags to constructors. `register` is idempotent for the
/// *same* tag only in the sense that a second `register` call for a tag
/// already bound is treated as a conflict — we cannot compare two
/// closures for behavioral equality, so "differing constructor" collapses
/// to "any second registration" here, which is the more conservative (and
/// exercisable) reading. Collisions panic: this only ever happens during
/// process start-up wiring, never mid-dispatch.
#[derive(Default)]
pub struct Registry {
    constructors: RwLock<HashMap<&'static str, Constructor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `type_tag` to `ctor`. Panics if `type_tag` is already bound —
    /// see the type-level doc comment for why that's the conservative
    /// reading of idempotent registration with fatal collisions.
    pub fn register<F>(&self, type_tag: &'static str, ctor: F)
    where
        F: Fn(serde_json::Value) -> Result<Box<dyn Dispatchable>, DispatchError> + Send + Sync + 'static,
    {
        let mut constructors = self.constructors.write().expect("registry lock poisoned");
        if constructors.contains_key(type_tag) {
            panic!("dispatch-core: type tag `{type_tag}` is already registered");
        }
        constructors.insert(type_tag, Arc::new(ctor));
    }

    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.constructors
            .read()
            .expect("registry lock poisoned")
            .contains_key(type_tag)
    }

    pub fn registered_tags(&self) -> Vec<&'static str> {
        self.constructors
            .read()
            .expect("registry lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    fn construct(&self, type_tag: &str, payload: serde_json::Value) -> Result<Box<dyn Dispatchable>, DispatchError> {
        let ctor = {
            let constructors = self.constructors.read().expect("registry lock poisoned");
            constructors
                .get(type_tag)
                .cloned()
                .ok_or_else(|| DispatchError::malformed_frame(format!("unregistered type tag `{type_tag}`")))?
        };
        ctor(payload)
    }

    /// `encode(callable) -> bytes`.
    pub fn encode(&self, callable: &dyn Dispatchable) -> Result<Vec<u8>, DispatchError> {
        let payload = callable.to_payload()?;
        let payload_bytes = serde_json::to_vec(&payload)
            .map_err(|e| DispatchError::malformed_frame(format!("payload serialization failed: {e}")))?;
        let mut frame = Vec::with_capacity(callable.type_tag().len() + FRAME_DELIMITER.len() + payload_bytes.len());
        frame.extend_from_slice(callable.type_tag().as_bytes());
        frame.extend_from_slice(FRAME_DELIMITER.as_bytes());
        frame.extend_from_slice(&payload_bytes);
        Ok(frame)
    }

    /// `decode(bytes) -> callable | MalformedFrame`.
    pub fn decode(&self, bytes: &[u8]) -> Result<Box<dyn Dispatchable>, DispatchError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| DispatchError::malformed_frame(format!("frame is not valid utf-8: {e}")))?;
        let mut parts = text.splitn(2, FRAME_DELIMITER);
        let type_tag = parts
            .next()
            .ok_or_else(|| DispatchError::malformed_frame("frame is empty"))?;
        let payload_text = parts
            .next()
            .ok_or_else(|| DispatchError::malformed_frame("frame is missing the `::` delimiter"))?;
        let payload: serde_json::Value = serde_json::from_str(payload_text)
            .map_err(|e| DispatchError::malformed_frame(format!("payload is not valid json: {e}")))?;
        self.construct(type_tag, payload)
    }
}
