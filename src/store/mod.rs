//! Token storage seam.
//!
//! Every method that changes a record performs its whole read-modify-write
//! while holding that record's lock, so callers never see a lost update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::token::{AnonymousToken, ConsumeOutcome};

pub mod memory;

pub use memory::MemoryTokenStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A live record already holds this token value.
    #[error("token already exists: {0}")]
    Conflict(String),

    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a new record. Never overwrites an existing token value.
    async fn insert(&self, token: AnonymousToken) -> Result<(), StoreError>;

    /// Snapshot of a record without touching its usage fields.
    async fn get(&self, token: &str) -> Result<Option<AnonymousToken>, StoreError>;

    /// Atomically check expiry and the usage limit, then record one use.
    async fn consume(
        &self,
        token: &str,
        now: DateTime<Utc>,
        max_requests: u32,
    ) -> Result<ConsumeOutcome, StoreError>;

    /// Move `expires_at` of a known record. Returns false if it is gone.
    async fn extend(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Delete every record with `expires_at < now`, re-checked per record at
    /// deletion time. Returns the number removed.
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}
