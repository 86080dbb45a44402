//! The error kind taxonomy shared by every crate in the workspace. Each
//! layer (storage, scheduler, lifecycle, channel) defines its own
//! `thiserror` enum for its internal failure modes, but every one of those
//! enums carries or converts into an [`ErrorKind`] so the API edge can apply
//! a single, consistent HTTP status mapping.

use serde::{Deserialize, Serialize};

/// The coarse-grained classification from which HTTP status codes and retry
/// policy are derived. Specific error types (`StoreError`, `SchedulerError`,
/// ...) each report one of these via `ErrorKind::of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-supplied input failed validation. HTTP 400.
    Validation,
    /// No valid credentials were presented (missing/malformed bearer token,
    /// bad login credentials). HTTP 401.
    Unauthenticated,
    /// The referenced resource does not exist, or is outside the caller's
    /// organization scope (indistinguishable from the caller's point of
    /// view, by design). HTTP 404.
    NotFound,
    /// The caller is authenticated but not authorized for the operation.
    /// HTTP 403.
    Forbidden,
    /// The request conflicts with the current state of the resource (for
    /// example, a desired-state mutation racing a terminal observed state).
    /// HTTP 409.
    Conflict,
    /// An organization- or user-level quota would be exceeded. HTTP 409.
    QuotaExceeded,
    /// No Agent is currently available to satisfy the request. HTTP 503.
    AgentUnavailable,
    /// The Scheduler found no eligible candidates (distinct from all
    /// candidates being at capacity). HTTP 503.
    NoCandidates,
    /// An operation exceeded its deadline (ack timeout, heartbeat grace).
    /// HTTP 504.
    Timeout,
    /// An unexpected failure that may succeed if retried. HTTP 500.
    Internal,
}

impl ErrorKind {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict | ErrorKind::QuotaExceeded => 409,
            ErrorKind::AgentUnavailable | ErrorKind::NoCandidates => 503,
            ErrorKind::Timeout => 504,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether a caller may reasonably retry the same request unmodified.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::AgentUnavailable
                | ErrorKind::NoCandidates
                | ErrorKind::Timeout
                | ErrorKind::Internal
        )
    }
}
