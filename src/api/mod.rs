use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::service::mask_token;
use crate::AppState;

pub mod handlers;

/// Header that protected endpoints read the anonymous token from.
pub const ANONYMOUS_TOKEN_HEADER: &str = "x-anonymous-token";

/// Token accepted by [`require_anonymous_token`], available to downstream
/// handlers as a request extension.
#[derive(Debug, Clone)]
pub struct ValidatedToken(pub String);

/// Token lifecycle routes. The caller mounts this under `/api/token`.
pub fn token_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(handlers::generate_token))
        .route("/validate", post(handlers::validate_token))
        .route("/refresh", post(handlers::refresh_token))
        .route("/info/:token", get(handlers::token_info))
}

/// Full HTTP application: health check, token API, CORS for the frontend
/// and response hardening headers.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .nest("/api/token", token_router())
        .fallback(fallback_404)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(middleware::from_fn(request_id_middleware))
}

/// Layer `require_anonymous_token` onto a router of protected endpoints.
pub fn protect(router: Router<Arc<AppState>>, state: Arc<AppState>) -> Router<Arc<AppState>> {
    router.layer(middleware::from_fn_with_state(state, require_anonymous_token))
}

async fn health_check() -> &'static str {
    "ok"
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Middleware: requires a valid `X-Anonymous-Token` header.
/// Each request that passes counts as one use of the token.
pub async fn require_anonymous_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(ANONYMOUS_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned);

    let Some(token) = token else {
        tracing::warn!("missing X-Anonymous-Token header");
        return Err(AppError::MissingAnonymousToken);
    };

    if !state.tokens.validate(&token).await {
        tracing::warn!(token = %mask_token(&token), "rejected anonymous token");
        return Err(AppError::InvalidAnonymousToken);
    }

    req.extensions_mut().insert(ValidatedToken(token));
    Ok(next.run(req).await)
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut()
            .insert(HeaderName::from_static("x-request-id"), val);
    }
    resp
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
