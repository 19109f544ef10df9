//! Lifecycle properties of the anonymous token service.
//!
//! Covers generation, usage accounting, expiry, refresh, sweeping, the
//! fail-closed behaviour on storage faults, and lost-update freedom under
//! concurrent validation.

use std::sync::Arc;

use anon_gateway::models::token::{AnonymousToken, ConsumeOutcome};
use anon_gateway::service::{TokenPolicy, TokenService};
use anon_gateway::store::{MemoryTokenStore, StoreError, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

fn setup() -> (MemoryTokenStore, Arc<TokenService>) {
    let store = MemoryTokenStore::new();
    let service = Arc::new(TokenService::new(
        Arc::new(store.clone()),
        TokenPolicy::default(),
    ));
    (store, service)
}

fn expired_record(value: &str) -> AnonymousToken {
    AnonymousToken::issue(
        value.to_string(),
        "s-old".to_string(),
        Utc::now() - Duration::hours(30),
        Duration::hours(24),
    )
}

// ═══════════════════════════════════════════════════════════════════
//  Generate / validate
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_validate_right_after_generate() {
    let (_, service) = setup();
    let before = Utc::now();
    let generated = tokio_test::assert_ok!(service.generate(None).await);

    assert!(generated.expires_at >= before + Duration::hours(24));
    assert!(generated.expires_at <= Utc::now() + Duration::hours(24));
    assert!(uuid::Uuid::parse_str(&generated.session_id).is_ok());

    assert!(service.validate(&generated.token).await);
    let info = service.info(&generated.token).await.unwrap();
    assert_eq!(info.request_count, 1);
    assert!(info.last_used_at.is_some());
}

#[tokio::test]
async fn test_generated_tokens_are_unique() {
    let (store, service) = setup();
    let mut seen = std::collections::HashSet::new();
    for _ in 0..200 {
        let t = service.generate(Some("same-session".into())).await.unwrap();
        assert!(seen.insert(t.token));
    }
    assert_eq!(store.len().await.unwrap(), 200);
}

#[tokio::test]
async fn test_unknown_token_is_rejected_without_creating_it() {
    let (store, service) = setup();
    assert!(!service.validate("anon_0_doesnotexist").await);
    assert!(service.info("anon_0_doesnotexist").await.is_none());
    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_session_scenario_hits_limit_at_100() {
    let (_, service) = setup();
    let t = service.generate(Some("s1".into())).await.unwrap();
    assert_eq!(t.session_id, "s1");

    for i in 1..=100 {
        assert!(service.validate(&t.token).await, "call {} should pass", i);
    }
    assert_eq!(service.info(&t.token).await.unwrap().request_count, 100);

    // the 101st and any later call fails, count stays capped
    for _ in 0..5 {
        assert!(!service.validate(&t.token).await);
    }

    let info = service.info(&t.token).await.unwrap();
    assert_eq!(info.session_id, "s1");
    assert_eq!(info.request_count, 100);
    assert!(!info.is_expired);
}

#[tokio::test]
async fn test_info_is_side_effect_free() {
    let (_, service) = setup();
    let t = service.generate(None).await.unwrap().token;

    let first = service.info(&t).await.unwrap();
    for _ in 0..10 {
        assert_eq!(service.info(&t).await.unwrap(), first);
    }
    assert_eq!(first.request_count, 0);
    assert!(first.last_used_at.is_none());

    assert!(service.validate(&t).await);
    let after = service.info(&t).await.unwrap();
    assert_eq!(after.request_count, 1);
    assert_ne!(after, first);
    assert_eq!(service.info(&t).await.unwrap(), after);
}

// ═══════════════════════════════════════════════════════════════════
//  Expiry, refresh, cleanup
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_expired_token_fails_and_is_swept() {
    let (store, service) = setup();
    store.insert(expired_record("anon_0_expired")).await.unwrap();
    let live = service.generate(None).await.unwrap().token;

    assert!(!service.validate("anon_0_expired").await);
    let info = service.info("anon_0_expired").await.unwrap();
    assert!(info.is_expired);
    assert_eq!(info.request_count, 0);

    assert_eq!(service.cleanup().await, 1);
    assert!(service.info("anon_0_expired").await.is_none());
    assert!(service.info(&live).await.is_some());
}

#[tokio::test]
async fn test_cleanup_twice_removes_nothing_the_second_time() {
    let (store, service) = setup();
    for i in 0..3 {
        store
            .insert(expired_record(&format!("anon_0_old{}", i)))
            .await
            .unwrap();
    }
    service.generate(None).await.unwrap();

    assert_eq!(service.cleanup().await, 3);
    assert_eq!(service.cleanup().await, 0);
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_refresh_unknown_token_creates_nothing() {
    let (store, service) = setup();
    assert!(!service.refresh("anon_0_ghost").await);
    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_refresh_extends_expiry_and_keeps_count() {
    let (store, service) = setup();
    let t = service.generate(None).await.unwrap().token;
    for _ in 0..3 {
        assert!(service.validate(&t).await);
    }

    let before = Utc::now();
    assert!(service.refresh(&t).await);
    let record = store.get(&t).await.unwrap().unwrap();

    assert!(record.expires_at >= before + Duration::hours(24));
    assert!(record.expires_at <= Utc::now() + Duration::hours(24));
    assert_eq!(record.request_count, 3);
}

#[tokio::test]
async fn test_refresh_revives_expired_but_unswept_token() {
    let (_, service) = setup_with(expired_record("anon_0_stale")).await;

    assert!(!service.validate("anon_0_stale").await);
    assert!(service.refresh("anon_0_stale").await);
    assert!(service.validate("anon_0_stale").await);
    assert_eq!(service.cleanup().await, 0);
}

#[tokio::test]
async fn test_refresh_does_not_resurrect_swept_token() {
    let (_, service) = setup_with(expired_record("anon_0_gone")).await;

    assert_eq!(service.cleanup().await, 1);
    assert!(!service.refresh("anon_0_gone").await);
    assert!(service.info("anon_0_gone").await.is_none());
}

#[tokio::test]
async fn test_refresh_does_not_reset_exhaustion() {
    let service = TokenService::new(
        Arc::new(MemoryTokenStore::new()),
        TokenPolicy {
            ttl: Duration::hours(24),
            max_requests: 3,
        },
    );
    let t = service.generate(None).await.unwrap().token;
    for _ in 0..3 {
        assert!(service.validate(&t).await);
    }
    assert!(service.refresh(&t).await);
    assert!(!service.validate(&t).await);
}

async fn setup_with(record: AnonymousToken) -> (MemoryTokenStore, Arc<TokenService>) {
    let (store, service) = setup();
    store.insert(record).await.unwrap();
    (store, service)
}

// ═══════════════════════════════════════════════════════════════════
//  Concurrency
// ═══════════════════════════════════════════════════════════════════

async fn parallel_validate(service: &Arc<TokenService>, token: &str, n: usize) -> usize {
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let service = service.clone();
            let token = token.to_string();
            tokio::spawn(async move { service.validate(&token).await })
        })
        .collect();

    futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|ok| *ok)
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_validate_under_limit_loses_no_updates() {
    let (_, service) = setup();
    let t = service.generate(None).await.unwrap().token;

    let granted = parallel_validate(&service, &t, 80).await;
    assert_eq!(granted, 80);
    assert_eq!(service.info(&t).await.unwrap().request_count, 80);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_parallel_validate_over_limit_grants_exactly_100() {
    let (_, service) = setup();
    let t = service.generate(None).await.unwrap().token;

    let granted = parallel_validate(&service, &t, 250).await;
    assert_eq!(granted, 100);
    assert_eq!(service.info(&t).await.unwrap().request_count, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refresh_racing_cleanup_never_loses_live_token() {
    let (store, service) = setup();
    for i in 0..50 {
        store
            .insert(expired_record(&format!("anon_0_race{}", i)))
            .await
            .unwrap();
    }

    let refresher = {
        let service = service.clone();
        tokio::spawn(async move {
            let mut refreshed = Vec::new();
            for i in 0..50 {
                let value = format!("anon_0_race{}", i);
                if service.refresh(&value).await {
                    refreshed.push(value);
                }
            }
            refreshed
        })
    };
    let sweeper = {
        let service = service.clone();
        tokio::spawn(async move { service.cleanup().await })
    };

    let refreshed = refresher.await.unwrap();
    let removed = sweeper.await.unwrap();

    // every token is either refreshed-and-kept or swept, never both
    assert_eq!(refreshed.len() + removed, 50);
    for value in &refreshed {
        let info = service.info(value).await.unwrap();
        assert!(!info.is_expired);
    }
    assert_eq!(service.cleanup().await, 0);
}

// ═══════════════════════════════════════════════════════════════════
//  Storage faults
// ═══════════════════════════════════════════════════════════════════

/// A backend whose every call fails.
struct UnavailableStore;

#[async_trait]
impl TokenStore for UnavailableStore {
    async fn insert(&self, _token: AnonymousToken) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    async fn get(&self, _token: &str) -> Result<Option<AnonymousToken>, StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    async fn consume(
        &self,
        _token: &str,
        _now: DateTime<Utc>,
        _max_requests: u32,
    ) -> Result<ConsumeOutcome, StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    async fn extend(&self, _token: &str, _expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    async fn remove_expired(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("disk on fire".into()))
    }
}

#[tokio::test]
async fn test_storage_fault_fails_closed() {
    let service = TokenService::new(Arc::new(UnavailableStore), TokenPolicy::default());

    let err = tokio_test::assert_err!(service.generate(Some("s1".into())).await);
    assert!(matches!(err, StoreError::Unavailable(_)));

    assert!(!service.validate("anon_1_x").await);
    assert!(!service.refresh("anon_1_x").await);
    assert!(service.info("anon_1_x").await.is_none());
    assert_eq!(service.cleanup().await, 0);
    assert!(service.try_cleanup().await.is_err());
}
