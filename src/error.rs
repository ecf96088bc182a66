use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

/// Crate-wide error taxonomy (spec §7). Every fallible internal API returns
/// `Result<T, AppError>` (or a local error convertible via `From`) and propagates
/// with `?`; the engine is the only place allowed to intentionally discard an
/// `Err` and stop silently, and only at the documented fail-silent points.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("bridge rejected the instance token")]
    AuthDenied,
    #[error("bridge unreachable: {0}")]
    Transport(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("tenant is not plan-valid: {0}")]
    PlanDenied(String),
    #[error("ai quota exceeded")]
    QuotaAi,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<diesel::result::Error> for AppError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => AppError::NotFound("row not found".to_string()),
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::AuthDenied => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Transport(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::PlanDenied(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::QuotaAi => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                sentry::capture_message(&err.to_string(), sentry::Level::Error);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
