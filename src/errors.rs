//! Crate-wide error taxonomy.
//!
//! Internal call chains propagate `anyhow::Result`; service and resolver boundaries convert
//! into [`AppError`] so API responses carry a stable kind code alongside a human message.

use async_graphql::ErrorExtensions;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("playback unsupported: {0}")]
    PlaybackUnsupported(String),

    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),

    #[error("artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable kind code, surfaced in API error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unavailable(_) => "UNAVAILABLE",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::PlaybackUnsupported(_) => "PLAYBACK_UNSUPPORTED",
            AppError::CapabilityMismatch(_) => "CAPABILITY_MISMATCH",
            AppError::ArtifactCorrupt(_) => "ARTIFACT_CORRUPT",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether a caller may retry this error after a backoff (per §7 propagation policy).
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Unavailable(_))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
            other => AppError::Internal(other.into()),
        }
    }
}

impl ErrorExtensions for AppError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", self.kind());
            e.set("retryable", self.is_retryable());
        })
    }
}

impl From<AppError> for async_graphql::Error {
    fn from(err: AppError) -> Self {
        err.extend()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::PlaybackUnsupported(_) | AppError::CapabilityMismatch(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::ArtifactCorrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_are_stable() {
        assert_eq!(AppError::NotFound("x".into()).kind(), "NOT_FOUND");
        assert_eq!(AppError::Unavailable("x".into()).kind(), "UNAVAILABLE");
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(AppError::Unavailable("x".into()).is_retryable());
        assert!(!AppError::NotFound("x".into()).is_retryable());
        assert!(!AppError::Conflict("x".into()).is_retryable());
    }
}
