//! Authenticated, rate-limited Kalshi REST client
//!
//! One logical call takes exactly one rate limit token, then runs the
//! signed request under the retry policy. Each attempt is signed afresh
//! because the signature binds the request timestamp.

use super::error::ApiError;
use super::rate_limiter::RateLimiter;
use super::retry::RetryPolicy;
use super::signing::RequestSigner;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Kalshi trade API base URL
pub const KALSHI_API_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";

pub const HEADER_ACCESS_KEY: &str = "KALSHI-ACCESS-KEY";
pub const HEADER_ACCESS_TIMESTAMP: &str = "KALSHI-ACCESS-TIMESTAMP";
pub const HEADER_ACCESS_SIGNATURE: &str = "KALSHI-ACCESS-SIGNATURE";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in an [`ApiError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// API key id plus the key that signs for it
#[derive(Debug, Clone)]
pub struct Credentials {
    pub key_id: String,
    pub signer: RequestSigner,
}

/// Query parameters for one request
pub type Query = Vec<(String, String)>;

/// Kalshi REST client, shared by reference across workers
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Create a client with the default timeout and retry policy
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, credentials, limiter, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        credentials: Credentials,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ApiError::Url(format!("{}: {}", base_url, e)))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            http,
            base_url,
            credentials,
            limiter,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an endpoint path (e.g. `/markets`) against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let full = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&full).map_err(|e| ApiError::Url(format!("{}: {}", full, e)))
    }

    /// Authenticated GET, decoded as `T`
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<T, ApiError> {
        self.get_until(path, query, None).await
    }

    /// Like [`get`](Self::get), but stop waiting for a rate limit token
    /// once `deadline` passes. A request already sent runs to completion.
    pub async fn get_until<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        deadline: Option<Instant>,
    ) -> Result<T, ApiError> {
        self.limiter.acquire_until(deadline).await?;

        let url = self.endpoint(path)?;
        let url = &url;
        self.retry
            .run(ApiError::is_transient, move |attempt| self.send_once(url, query, attempt))
            .await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(String, String)],
        attempt: u32,
    ) -> Result<T, ApiError> {
        let path = url.path().to_string();
        let timestamp_ms = Utc::now().timestamp_millis();
        let signature = self.credentials.signer.sign(timestamp_ms, "GET", &path)?;

        tracing::debug!(path = %path, attempt, params = query.len(), "Sending request");

        let started = std::time::Instant::now();
        let response = self
            .http
            .get(url.clone())
            .query(query)
            .header(HEADER_ACCESS_KEY, &self.credentials.key_id)
            .header(HEADER_ACCESS_TIMESTAMP, timestamp_ms.to_string())
            .header(HEADER_ACCESS_SIGNATURE, signature)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                path: path.clone(),
                source,
            })?;

        let status = response.status();
        metrics::counter!(crate::telemetry::API_REQUESTS, "status" => status.as_u16().to_string())
            .increment(1);
        metrics::histogram!(crate::telemetry::API_REQUEST_LATENCY)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                path,
                body,
            });
        }

        let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
            path: path.clone(),
            source,
        })?;

        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode { path, source })
    }
}
