use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An issued anonymous token as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousToken {
    pub token: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub request_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl AnonymousToken {
    /// Fresh record with no recorded usage, valid for `ttl` from `now`.
    pub fn issue(
        token: String,
        session_id: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            token,
            session_id,
            created_at: now,
            expires_at: now + ttl,
            request_count: 0,
            last_used_at: None,
        }
    }

    /// Valid through `expires_at` inclusive.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Sweep eligibility. Mirrors `is_expired_at` so a token is never both
    /// valid and removable at the same instant.
    pub fn is_removable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn is_exhausted(&self, max_requests: u32) -> bool {
        self.request_count >= max_requests
    }

    pub fn info(&self) -> TokenInfo {
        TokenInfo {
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            request_count: self.request_count,
            last_used_at: self.last_used_at,
            is_expired: self.is_expired(),
        }
    }
}

/// Public, read-only view of a token. The token value itself is not echoed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub request_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
}

/// Returned to the caller of `generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub session_id: String,
}

/// Outcome of a single consume attempt against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Usage recorded; carries the count after the increment.
    Granted(u32),
    Unknown,
    Expired,
    Exhausted,
}
