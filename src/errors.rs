use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("token is required")]
    TokenRequired,

    /// Carries the route-specific message returned to the client.
    #[error("token not found")]
    TokenNotFound(&'static str),

    #[error("anonymous token is required")]
    MissingAnonymousToken,

    #[error("invalid or expired token")]
    InvalidAnonymousToken,

    #[error("token generation failed: {0}")]
    Generate(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::TokenRequired => (StatusCode::BAD_REQUEST, "Token is required"),
            AppError::TokenNotFound(msg) => (StatusCode::NOT_FOUND, *msg),
            AppError::MissingAnonymousToken => {
                (StatusCode::UNAUTHORIZED, "Anonymous token is required")
            }
            AppError::InvalidAnonymousToken => {
                (StatusCode::UNAUTHORIZED, "Invalid or expired token")
            }
            AppError::Generate(e) => {
                tracing::error!("Error generating token: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error generating token")
            }
        };

        (status, Json(json!({ "message": msg }))).into_response()
    }
}
