//! Error taxonomy for the dispatch pipeline.
//!
//! Every kind the pipeline can raise is a variant here rather than a
//! separate type per stage — the retry/DLQ shell needs to classify a single
//! value, not match on a family of concrete error types.

use std::fmt;

use thiserror::Error;

/// The crate's error type. `no_retry` is tracked per-instance rather than
/// as a distinct variant so a `User` error can opt out of retries without
/// a second enum.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Frame could not be split on `::`, the tag was unknown, or the
    /// payload didn't hydrate into the registered type. Never retried.
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// A mixin is declared on the callable but the consumer context lacks
    /// the facility it needs (logger, service locator, store handle).
    /// Treated as an operator/programming error; never retried.
    #[error("missing capability: {what}")]
    MissingCapability { what: String },

    /// Mixin parameters failed the pure pre-flight checks in `validate.rs`.
    /// Never retried.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// A coordination store (debounce/rate-limit/concurrency) call failed.
    /// Transient by nature; retried per the ladder unless explicitly tagged.
    #[error("coordination store error: {reason}")]
    CoordinationStore {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The callable body, an `init` hook, `completed`, or `on_error` raised.
    /// Retried unless `no_retry` is set.
    #[error("callable body failed: {reason}")]
    User {
        reason: String,
        no_retry: bool,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The queue provider failed while (re)publishing or routing to a DLQ.
    /// Propagated to the host; the retry shell does not classify this one.
    #[error("transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DispatchError {
    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    pub fn missing_capability(what: impl Into<String>) -> Self {
        Self::MissingCapability { what: what.into() }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn coordination_store(reason: impl Into<String>) -> Self {
        Self::CoordinationStore {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn coordination_store_with_cause(
        reason: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::CoordinationStore {
            reason: reason.into(),
            source: Some(Box::new(cause)),
        }
    }

    pub fn user(reason: impl Into<String>) -> Self {
        Self::User {
            reason: reason.into(),
            no_retry: false,
            source: None,
        }
    }

    /// Tags the error so the retry/DLQ shell routes it straight to the DLQ
    /// on the first failure instead of consulting the interval ladder.
    pub fn user_no_retry(reason: impl Into<String>) -> Self {
        Self::User {
            reason: reason.into(),
            no_retry: true,
            source: None,
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn transport_with_cause(
        reason: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            reason: reason.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// The `callable-no-retry` metadata flag suppresses the retry ladder
    /// regardless of kind; `MalformedFrame`/`MissingCapability`/`Validation`
    /// are no-retry by construction.
    pub fn is_no_retry(&self) -> bool {
        match self {
            Self::MalformedFrame { .. }
            | Self::MissingCapability { .. }
            | Self::Validation { .. } => true,
            Self::User { no_retry, .. } => *no_retry,
            Self::CoordinationStore { .. } | Self::Transport { .. } => false,
        }
    }

    /// Only `MalformedFrame` skips the DLQ's usual "read retry-count" path
    /// and lands there immediately — a dedicated check, independent of
    /// `is_no_retry`.
    pub fn is_malformed_frame(&self) -> bool {
        matches!(self, Self::MalformedFrame { .. })
    }
}

/// Wraps a pipeline error together with the callable instance that produced
/// it. `callable` is `None` only when the error happened before a callable
/// could be constructed (a malformed frame during decode).
pub struct CallableError {
    pub error: DispatchError,
    pub callable: Option<Box<dyn crate::wire::Dispatchable>>,
}

impl CallableError {
    pub(crate) fn new(error: DispatchError, callable: Option<Box<dyn crate::wire::Dispatchable>>) -> Self {
        Self { error, callable }
    }
}

impl fmt::Debug for CallableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableError")
            .field("error", &self.error)
            .field("callable", &self.callable.as_ref().map(|c| c.type_tag()))
            .finish()
    }
}

impl fmt::Display for CallableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for CallableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
