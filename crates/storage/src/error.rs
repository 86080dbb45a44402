use streamspace_core::ErrorKind;
use thiserror::Error;

/// Failure semantics from §4.1: transient errors are `Retryable`,
/// constraint violations are `Conflict`, unknown rows are `NotFound`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{resource_type} {resource_id} not found")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("transient store failure, retry: {0}")]
    Retryable(String),
}

impl StoreError {
    pub fn not_found(resource_type: &'static str, resource_id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::QuotaExceeded => ErrorKind::QuotaExceeded,
            StoreError::Retryable(_) => ErrorKind::Internal,
        }
    }
}
