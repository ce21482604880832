use thiserror::Error;

/// The error taxonomy is kinds, not types: every failure in the repo
/// mutation pipeline, the firehose, and the proxy collapses into one of
/// these six buckets, each with a fixed HTTP mapping (see `haven-server::error`).
#[derive(Debug, Error)]
pub enum PdsError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PdsError {
    pub fn storage(msg: impl Into<String>) -> Self {
        PdsError::Internal(format!("storage error: {}", msg.into()))
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        PdsError::Internal(format!("crypto error: {}", msg.into()))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PdsError::Conflict(_))
    }
}

pub type PdsResult<T> = Result<T, PdsError>;
