// =============================================================================
// Shared Error Types — HTTP-facing error mapping
// =============================================================================
//
// Workers use `anyhow::Result` at their outer loops (one bad message must
// never kill the loop — see `retry::safe_*`). The query/HTTP boundary
// needs a narrower, typed error so handlers can map failures to the right
// status code: validation failures are 400, everything else is a
// generic 500.
// =============================================================================

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<crate::validation::ValidationError> for AppError {
    fn from(e: crate::validation::ValidationError) -> Self {
        AppError::Validation(e.0)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(anyhow::anyhow!(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error serving request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
