//! Anonymous token lifecycle: issue, validate, refresh, inspect, sweep.
//!
//! Denials (unknown, expired, exhausted) are plain `false`/`None`. Storage
//! faults are logged and fail closed everywhere except `generate`, which
//! surfaces them because the caller cannot proceed without a token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;

use crate::models::token::{AnonymousToken, ConsumeOutcome, GeneratedToken, TokenInfo};
use crate::store::{StoreError, TokenStore};

pub const TOKEN_PREFIX: &str = "anon";
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
pub const DEFAULT_MAX_REQUESTS_PER_TOKEN: u32 = 100;

/// 256 bits of entropy per token.
const TOKEN_ENTROPY_BYTES: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub ttl: Duration,
    pub max_requests: u32,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            max_requests: DEFAULT_MAX_REQUESTS_PER_TOKEN,
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    policy: TokenPolicy,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, policy: TokenPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// Issue a new token. A missing or empty `session_id` gets a fresh UUID.
    pub async fn generate(&self, session_id: Option<String>) -> Result<GeneratedToken, StoreError> {
        let session_id = session_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let now = Utc::now();
        let record = AnonymousToken::issue(
            generate_token_value(now.timestamp()),
            session_id,
            now,
            self.policy.ttl,
        );
        let response = GeneratedToken {
            token: record.token.clone(),
            expires_at: record.expires_at,
            session_id: record.session_id.clone(),
        };

        if let Err(e) = self.store.insert(record).await {
            tracing::error!(session_id = %response.session_id, "failed to store anonymous token: {}", e);
            return Err(e);
        }

        tracing::info!(session_id = %response.session_id, "generated anonymous token");
        Ok(response)
    }

    /// Record one use of `token` if it is known, unexpired and under the limit.
    pub async fn validate(&self, token: &str) -> bool {
        let outcome = match self
            .store
            .consume(token, Utc::now(), self.policy.max_requests)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(token = %mask_token(token), "token validation failed: {}", e);
                return false;
            }
        };

        match outcome {
            ConsumeOutcome::Granted(count) => {
                tracing::debug!(token = %mask_token(token), count, "token validated");
                true
            }
            ConsumeOutcome::Unknown => {
                tracing::warn!(token = %mask_token(token), "token not found");
                false
            }
            ConsumeOutcome::Expired => {
                tracing::warn!(token = %mask_token(token), "token expired");
                false
            }
            ConsumeOutcome::Exhausted => {
                tracing::warn!(
                    token = %mask_token(token),
                    limit = self.policy.max_requests,
                    "token request limit exceeded"
                );
                false
            }
        }
    }

    /// Push expiry to `now + ttl`. Usage count is kept; deleted tokens stay deleted.
    pub async fn refresh(&self, token: &str) -> bool {
        let expires_at = Utc::now() + self.policy.ttl;
        match self.store.extend(token, expires_at).await {
            Ok(true) => {
                tracing::info!(token = %mask_token(token), "refreshed token");
                true
            }
            Ok(false) => false,
            Err(e) => {
                tracing::error!(token = %mask_token(token), "token refresh failed: {}", e);
                false
            }
        }
    }

    /// Side-effect-free snapshot; does not count as a use.
    pub async fn info(&self, token: &str) -> Option<TokenInfo> {
        match self.store.get(token).await {
            Ok(record) => record.map(|t| t.info()),
            Err(e) => {
                tracing::error!(token = %mask_token(token), "token lookup failed: {}", e);
                None
            }
        }
    }

    /// Sweep expired tokens, degrading to 0 on a storage fault.
    pub async fn cleanup(&self) -> usize {
        match self.try_cleanup().await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!("error cleaning up expired tokens: {}", e);
                0
            }
        }
    }

    /// Sweep variant that reports storage faults, for the background job.
    pub async fn try_cleanup(&self) -> Result<usize, StoreError> {
        let removed = self.store.remove_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "cleaned up expired tokens");
        }
        Ok(removed)
    }
}

/// `anon_{unix_seconds}_{base64url(32 random bytes)}`.
///
/// The timestamp is only a debugging aid; uniqueness rests on the random part.
pub fn generate_token_value(unix_seconds: i64) -> String {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!(
        "{}_{}_{}",
        TOKEN_PREFIX,
        unix_seconds,
        URL_SAFE_NO_PAD.encode(bytes)
    )
}

/// Never log a full token.
pub(crate) fn mask_token(token: &str) -> String {
    match token.get(..8) {
        Some(head) if token.len() > 12 => format!("{}…", head),
        _ => "****".to_string(),
    }
}
