//! Background job: sweep expired anonymous tokens.
//!
//! Runs once at startup, then every `interval` (hourly by default). A failed
//! pass is logged and retried after `retry_delay`; the loop itself only ends
//! on cancellation.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::service::TokenService;

#[derive(Debug, Clone, Copy)]
pub struct CleanupSchedule {
    pub interval: Duration,
    pub retry_delay: Duration,
}

impl Default for CleanupSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            retry_delay: Duration::from_secs(300),
        }
    }
}

/// Spawn the background cleanup task. Call this once at startup.
pub fn spawn(
    service: Arc<TokenService>,
    schedule: CleanupSchedule,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move { run(service, schedule, cancel).await })
}

async fn run(service: Arc<TokenService>, schedule: CleanupSchedule, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = schedule.interval.as_secs(),
        "token cleanup job started"
    );

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let wait = match service.try_cleanup().await {
            Ok(_) => schedule.interval,
            Err(e) => {
                tracing::error!("token cleanup job failed: {}", e);
                schedule.retry_delay
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    tracing::info!("token cleanup job stopped");
}
