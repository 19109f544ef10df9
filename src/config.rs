use std::str::FromStr;
use std::time::Duration;

use crate::jobs::cleanup::CleanupSchedule;
use crate::service::{TokenPolicy, DEFAULT_MAX_REQUESTS_PER_TOKEN, DEFAULT_TOKEN_TTL_HOURS};

/// Ten years. Keeps `now + ttl` well inside chrono's representable range.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Lifetime of an issued or refreshed token.
    /// Set via ANON_TOKEN_TTL_HOURS. Default: 24.
    pub token_ttl_hours: i64,
    /// Successful validations allowed per token.
    /// Set via ANON_MAX_REQUESTS. Default: 100.
    pub max_requests_per_token: u32,
    pub cleanup_interval_secs: u64,
    /// Delay before retrying after a failed cleanup pass.
    pub cleanup_retry_secs: u64,
    /// Origins allowed by CORS (the valuation frontend).
    /// Comma-separated via ANON_ALLOWED_ORIGINS.
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 12001,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            max_requests_per_token: DEFAULT_MAX_REQUESTS_PER_TOKEN,
            cleanup_interval_secs: 3600,
            cleanup_retry_secs: 300,
            allowed_origins: vec!["http://localhost:12000".to_string()],
        }
    }
}

impl Config {
    pub fn token_policy(&self) -> TokenPolicy {
        TokenPolicy {
            ttl: chrono::Duration::hours(self.token_ttl_hours),
            max_requests: self.max_requests_per_token,
        }
    }

    pub fn cleanup_schedule(&self) -> CleanupSchedule {
        CleanupSchedule {
            interval: Duration::from_secs(self.cleanup_interval_secs),
            retry_delay: Duration::from_secs(self.cleanup_retry_secs),
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from any key lookup. Unparsable values fall back to defaults.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let cfg = Config {
        port: parse_var(&lookup, "ANON_PORT").unwrap_or(defaults.port),
        token_ttl_hours: parse_var(&lookup, "ANON_TOKEN_TTL_HOURS")
            .unwrap_or(defaults.token_ttl_hours),
        max_requests_per_token: parse_var(&lookup, "ANON_MAX_REQUESTS")
            .unwrap_or(defaults.max_requests_per_token),
        cleanup_interval_secs: parse_var(&lookup, "ANON_CLEANUP_INTERVAL_SECS")
            .unwrap_or(defaults.cleanup_interval_secs),
        cleanup_retry_secs: parse_var(&lookup, "ANON_CLEANUP_RETRY_SECS")
            .unwrap_or(defaults.cleanup_retry_secs),
        allowed_origins: match lookup("ANON_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => defaults.allowed_origins,
        },
    };

    if cfg.token_ttl_hours <= 0 {
        anyhow::bail!("ANON_TOKEN_TTL_HOURS must be positive, got {}", cfg.token_ttl_hours);
    }
    if cfg.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
        anyhow::bail!(
            "ANON_TOKEN_TTL_HOURS must be at most {}, got {}",
            MAX_TOKEN_TTL_HOURS,
            cfg.token_ttl_hours
        );
    }
    if cfg.max_requests_per_token == 0 {
        anyhow::bail!("ANON_MAX_REQUESTS must be at least 1");
    }
    if cfg.cleanup_interval_secs == 0 {
        anyhow::bail!("ANON_CLEANUP_INTERVAL_SECS must be at least 1");
    }
    if cfg.cleanup_retry_secs == 0 {
        anyhow::bail!("ANON_CLEANUP_RETRY_SECS must be at least 1");
    }

    Ok(cfg)
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
