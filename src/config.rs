//! Configuration types for longshot-ingest
//!
//! Loaded once at startup and passed by reference into constructors.

use crate::api::{ApiClient, Credentials, RateLimiter, RequestSigner, RetryPolicy, KALSHI_API_URL};
use crate::ingest::Collector;
use crate::storage::{ArtifactPaths, LocalStorage};
use crate::telemetry::LogFormat;
use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Overrides `api.key_id`
pub const ENV_KEY_ID: &str = "KALSHI_API_KEY_ID";
/// Overrides `api.private_key`; literal `\n` sequences become newlines
pub const ENV_PRIVATE_KEY: &str = "KALSHI_PRIVATE_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub trades: TradesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Exchange endpoint and credentials
#[derive(Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    pub key_id: Option<String>,

    /// PEM file holding the signing key
    pub private_key_path: Option<PathBuf>,

    /// Inline PEM; takes precedence over `private_key_path`
    pub private_key: Option<String>,

    pub private_key_password: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .field("private_key_path", &self.private_key_path)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("private_key_password", &self.private_key_password.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_base_url() -> String {
    KALSHI_API_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            key_id: None,
            private_key_path: None,
            private_key: None,
            private_key_password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Shared request budget
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens per second
    #[serde(default = "default_rate")]
    pub rate: f64,

    /// Bucket capacity; twice the rate when unset
    pub burst: Option<f64>,
}

fn default_rate() -> f64 {
    10.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            burst: None,
        }
    }
}

impl RateLimitConfig {
    pub fn burst(&self) -> f64 {
        self.burst.unwrap_or(self.rate * 2.0)
    }
}

/// Retry policy for transient HTTP failures
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Per-market fan-out
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Log progress every N completed markets
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,

    /// Abandon outstanding work after this many seconds
    pub deadline_secs: Option<u64>,
}

fn default_max_workers() -> usize {
    8
}
fn default_progress_every() -> usize {
    100
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            progress_every: default_progress_every(),
            deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradesConfig {
    /// Only fetch trades this many seconds before the snapshot
    pub lookback_secs: Option<i64>,
}

/// Where artifacts are written
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data")
}
fn default_prefix() -> String {
    "kalshi".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            prefix: default_prefix(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this port
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config = Self::parse(&content)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply credential overrides from `lookup` (normally the environment)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key_id) = lookup(ENV_KEY_ID).filter(|v| !v.is_empty()) {
            self.api.key_id = Some(key_id);
        }
        if let Some(pem) = lookup(ENV_PRIVATE_KEY).filter(|v| !v.is_empty()) {
            self.api.private_key = Some(pem.replace("\\n", "\n"));
        }
    }

    /// Key id plus a parsed signing key
    pub fn credentials(&self) -> anyhow::Result<Credentials> {
        let key_id = self
            .api
            .key_id
            .clone()
            .filter(|k| !k.is_empty())
            .with_context(|| format!("No API key id: set api.key_id or {}", ENV_KEY_ID))?;

        let pem = match (&self.api.private_key, &self.api.private_key_path) {
            (Some(pem), _) => pem.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read private key {}", path.display()))?,
            (None, None) => anyhow::bail!(
                "No private key: set api.private_key_path, api.private_key or {}",
                ENV_PRIVATE_KEY
            ),
        };

        let signer = RequestSigner::from_pem(&pem, self.api.private_key_password.as_deref())?;
        Ok(Credentials { key_id, signer })
    }

    /// Shared token bucket; the rate must be a positive number
    pub fn rate_limiter(&self) -> anyhow::Result<RateLimiter> {
        let rate = self.rate_limit.rate;
        if !(rate.is_finite() && rate > 0.0) {
            anyhow::bail!("rate_limit.rate must be positive, got {}", rate);
        }
        Ok(RateLimiter::new(rate, self.rate_limit.burst()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts, Duration::from_millis(self.retry.base_delay_ms))
    }

    /// Time allowed for trade collection once it starts
    pub fn collector_budget(&self) -> Option<Duration> {
        self.collector.deadline_secs.map(Duration::from_secs)
    }

    pub fn collector(&self) -> Collector {
        Collector::new(self.collector.max_workers).progress_every(self.collector.progress_every)
    }

    /// Authenticated client over a fresh rate budget
    pub fn build_client(&self) -> anyhow::Result<ApiClient> {
        let client = ApiClient::with_timeout(
            self.api.base_url.clone(),
            self.credentials()?,
            Arc::new(self.rate_limiter()?),
            Duration::from_secs(self.api.timeout_secs),
        )?
        .retry_policy(self.retry_policy());

        Ok(client)
    }

    pub fn storage(&self) -> LocalStorage {
        LocalStorage::new(self.storage.root.clone())
    }

    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(self.storage.prefix.clone())
    }
}
