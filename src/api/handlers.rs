use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::token::{GeneratedToken, TokenInfo};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenResponse {
    pub is_valid: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /api/token/generate: issue a new anonymous token
///
/// The body is optional; a missing or unparsable body issues a token for a
/// fresh session.
pub async fn generate_token(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<GenerateTokenRequest>>,
) -> Result<Json<GeneratedToken>, AppError> {
    let session_id = payload.and_then(|Json(req)| req.session_id);
    let generated = state.tokens.generate(session_id).await?;
    Ok(Json(generated))
}

/// POST /api/token/validate: body is the token as a JSON string
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    Json(token): Json<String>,
) -> Result<Json<ValidateTokenResponse>, AppError> {
    if token.is_empty() {
        return Err(AppError::TokenRequired);
    }

    let is_valid = state.tokens.validate(&token).await;
    Ok(Json(ValidateTokenResponse { is_valid }))
}

/// POST /api/token/refresh: extend expiry of a known token
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(token): Json<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if token.is_empty() {
        return Err(AppError::TokenRequired);
    }

    if !state.tokens.refresh(&token).await {
        return Err(AppError::TokenNotFound(
            "Token not found or cannot be refreshed",
        ));
    }

    Ok(Json(MessageResponse {
        message: "Token refreshed successfully".to_string(),
    }))
}

/// GET /api/token/info/:token: inspect without counting a use
pub async fn token_info(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<TokenInfo>, AppError> {
    state
        .tokens
        .info(&token)
        .await
        .map(Json)
        .ok_or(AppError::TokenNotFound("Token not found"))
}
