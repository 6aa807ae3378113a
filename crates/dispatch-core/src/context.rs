//! Facilities the dispatcher injects into a callable: a logger for
//! `Logged` and a service locator for `DependencyBound`. Neither is
//! serialized — the wire codec never sees them; fields a callable marks
//! logger-bound or dependency-bound stay elided on write.

use std::any::{Any, TypeId};
use std::sync::Arc;

use tracing::Span;

/// A thin, clonable handle around a `tracing::Span` so callables get a
/// real structured logger without this crate inventing a parallel logging
/// trait hierarchy that just forwards to `tracing` underneath.
#[derive(Clone, Debug)]
pub struct DispatchLogger {
    span: Span,
}

impl DispatchLogger {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    pub fn for_queue(queue_name: &str, type_tag: &str) -> Self {
        Self::new(tracing::info_span!("dispatch", queue = %queue_name, callable = %type_tag))
    }

    pub fn info(&self, message: impl AsRef<str>) {
        let _enter = self.span.enter();
        tracing::info!("{}", message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let _enter = self.span.enter();
        tracing::warn!("{}", message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let _enter = self.span.enter();
        tracing::error!("{}", message.as_ref());
    }
}

/// Resolves a callable's `DependencyBound` fields by type. Hosts implement
/// this over whatever DI container they already run; the crate only
/// specifies the contract. The hosting runtime and a callable's business
/// logic both stay external collaborators.
pub trait ServiceLocator: Send + Sync {
    fn resolve_any(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;
}

impl dyn ServiceLocator {
    /// Typed convenience wrapper over `resolve_any`.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resolve_any(TypeId::of::<T>())
            .and_then(|any| any.downcast::<T>().ok())
    }
}

/// Consumer-side facilities available to a dispatch invocation. A missing
/// facility that a callable's mixin requires is a `MissingCapability`
/// error, not a silent no-op.
#[derive(Clone, Default)]
pub struct DispatchContext {
    pub logger: Option<DispatchLogger>,
    pub services: Option<Arc<dyn ServiceLocator>>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: DispatchLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_services(mut self, services: Arc<dyn ServiceLocator>) -> Self {
        self.services = Some(services);
        self
    }
}
