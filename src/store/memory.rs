use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use super::{StoreError, TokenStore};
use crate::models::token::{AnonymousToken, ConsumeOutcome};

/// In-process token store on a sharded `DashMap`.
///
/// A `get_mut`/`entry` guard holds the shard write lock for the key, which
/// gives per-token serialization while other shards proceed in parallel.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<DashMap<String, AnonymousToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, token: AnonymousToken) -> Result<(), StoreError> {
        match self.tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(token.token)),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    async fn get(&self, token: &str) -> Result<Option<AnonymousToken>, StoreError> {
        Ok(self.tokens.get(token).map(|entry| entry.value().clone()))
    }

    async fn consume(
        &self,
        token: &str,
        now: DateTime<Utc>,
        max_requests: u32,
    ) -> Result<ConsumeOutcome, StoreError> {
        let Some(mut entry) = self.tokens.get_mut(token) else {
            return Ok(ConsumeOutcome::Unknown);
        };

        if entry.is_expired_at(now) {
            return Ok(ConsumeOutcome::Expired);
        }
        if entry.is_exhausted(max_requests) {
            return Ok(ConsumeOutcome::Exhausted);
        }

        entry.request_count += 1;
        entry.last_used_at = Some(now);
        Ok(ConsumeOutcome::Granted(entry.request_count))
    }

    async fn extend(&self, token: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        match self.tokens.get_mut(token) {
            Some(mut entry) => {
                entry.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        // `retain` visits each entry under its shard write lock, so the check
        // sees the current expiry rather than a snapshot.
        let mut removed = 0;
        self.tokens.retain(|_, token| {
            if token.is_removable_at(now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.tokens.len())
    }
}
