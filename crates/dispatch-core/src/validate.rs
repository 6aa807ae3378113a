//! Pure parameter checks, run before any external store is touched. Each
//! check is independent and returns `DispatchError::Validation` with a
//! message naming the offending field.

use crate::capability::{ConcurrencyCappedSpec, DebouncedSpec, RateLimitedSpec, RepeatedSpec};
use crate::error::DispatchError;

pub fn validate_debounced(spec: &DebouncedSpec) -> Result<(), DispatchError> {
    if spec.interval.is_zero() {
        return Err(DispatchError::validation("Debounced.interval must be > 0"));
    }
    if spec.type_key.is_empty() {
        return Err(DispatchError::validation("Debounced.typeKey must be non-empty"));
    }
    if matches!(&spec.instance_key, Some(key) if key.is_empty()) {
        return Err(DispatchError::validation(
            "Debounced.instanceKey must be non-empty once the publisher has set it",
        ));
    }
    Ok(())
}

pub fn validate_rate_limited(spec: &RateLimitedSpec) -> Result<(), DispatchError> {
    if spec.per_period < 1 {
        return Err(DispatchError::validation("RateLimited.perPeriod must be >= 1"));
    }
    if spec.period.is_zero() {
        return Err(DispatchError::validation("RateLimited.period must be > 0"));
    }
    Ok(())
}

pub fn validate_concurrency_capped(spec: &ConcurrencyCappedSpec) -> Result<(), DispatchError> {
    if spec.limit < 1 {
        return Err(DispatchError::validation("ConcurrencyCapped.limit must be >= 1"));
    }
    if spec.type_key.is_empty() {
        return Err(DispatchError::validation(
            "ConcurrencyCapped.typeKey must be non-empty",
        ));
    }
    Ok(())
}

pub fn validate_repeated(spec: &RepeatedSpec, current_call: Option<u32>) -> Result<(), DispatchError> {
    if spec.max_calls < 1 {
        return Err(DispatchError::validation("Repeated.maxCalls must be >= 1"));
    }
    if spec.interval.is_zero() {
        return Err(DispatchError::validation("Repeated.interval must be > 0"));
    }
    if let Some(current) = current_call {
        if current >= spec.max_calls {
            return Err(DispatchError::validation(
                "Repeated.currentCall must be in [0, maxCalls)",
            ));
        }
    }
    Ok(())
}
