//! The single edge error type every handler returns. Every internal error
//! type in this crate converts `From` into it; its `IntoResponse` impl
//! performs the §7 HTTP status mapping in one place, mirroring the
//! teacher's `ConnectionError`/`ProtocolError` edge-conversion pattern.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use streamspace_core::ErrorKind;
use streamspace_storage::StoreError;
use streamspace_wire::api::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    Conflict(String),
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("no agents available")]
    NoCandidates,
    #[error("selected agent is unavailable")]
    AgentUnavailable,
    #[error("operation timed out")]
    Timeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Unauthenticated => ErrorKind::Unauthenticated,
            ApiError::NotFound => ErrorKind::NotFound,
            ApiError::Forbidden => ErrorKind::Forbidden,
            ApiError::Conflict(_) => ErrorKind::Conflict,
            ApiError::QuotaExceeded => ErrorKind::QuotaExceeded,
            ApiError::NoCandidates => ErrorKind::NoCandidates,
            ApiError::AgentUnavailable => ErrorKind::AgentUnavailable,
            ApiError::Timeout => ErrorKind::Timeout,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound,
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::QuotaExceeded => ApiError::QuotaExceeded,
            StoreError::Retryable(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}
