//! Error taxonomy for the prediction gateway
//!
//! Backend errors trigger fallback routing and are surfaced only once all
//! fallbacks are exhausted. Cache tier outages and validation budget
//! exhaustion are recovered locally and never reach these types.

use thiserror::Error;

/// Failure modes of a single backend call
///
/// Each variant advances the router to the next fallback; none is retried
/// against the same backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend {backend} timed out after {timeout_ms}ms")]
    Timeout { backend: String, timeout_ms: u64 },

    #[error("backend {backend} rate limited the request")]
    RateLimited { backend: String },

    #[error("backend {backend} unavailable: {reason}")]
    Unavailable { backend: String, reason: String },
}

impl BackendError {
    /// Backend id this error came from
    pub fn backend(&self) -> &str {
        match self {
            BackendError::Timeout { backend, .. }
            | BackendError::RateLimited { backend }
            | BackendError::Unavailable { backend, .. } => backend,
        }
    }

    /// Short kind tag for metrics and audit records
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Timeout { .. } => "timeout",
            BackendError::RateLimited { .. } => "rate_limited",
            BackendError::Unavailable { .. } => "unavailable",
        }
    }
}

/// Errors surfaced to the gateway's callers
///
/// Clone is required so the coalescer can fan a single failure out to
/// every waiter that joined the in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("all backends exhausted for this request, last error: {last}")]
    AllBackendsExhausted { last: BackendError },

    #[error("validation unavailable: {reason}")]
    ValidationUnavailable { reason: String },

    #[error("internal gateway error: {reason}")]
    Internal { reason: String },
}

impl GatewayError {
    /// Short kind tag for metrics and audit records
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::AllBackendsExhausted { .. } => "all_backends_exhausted",
            GatewayError::ValidationUnavailable { .. } => "validation_unavailable",
            GatewayError::Internal { .. } => "internal",
        }
    }
}
