//! Anonymous token gateway: library crate for the binary and integration tests.
//!
//! Issues opaque, rate-limited anonymous tokens for the valuation API and
//! sweeps expired ones in the background.

use std::sync::Arc;

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod service;
pub mod store;

use service::TokenService;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub config: config::Config,
}
