//! Shared fixtures for integration tests
#![allow(dead_code)]

use longshot_ingest::api::{ApiClient, Credentials, RateLimiter, RequestSigner, RetryPolicy};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::MockServer;

pub const TEST_KEY: &str = include_str!("../fixtures/test_key.pem");
pub const KEY_ID: &str = "test-key-id";
pub const API_PREFIX: &str = "/trade-api/v2";

pub fn signer() -> RequestSigner {
    RequestSigner::from_pem(TEST_KEY, None).unwrap()
}

pub fn credentials() -> Credentials {
    Credentials {
        key_id: KEY_ID.to_string(),
        signer: signer(),
    }
}

/// Client against the mock server with a generous budget and fast retries
pub fn client(server: &MockServer, max_attempts: u32) -> ApiClient {
    ApiClient::new(
        format!("{}{}", server.uri(), API_PREFIX),
        credentials(),
        Arc::new(RateLimiter::new(1000.0, 1000.0)),
    )
    .unwrap()
    .retry_policy(RetryPolicy::new(max_attempts, Duration::from_millis(1)))
}

/// Client against the mock server drawing from `limiter`, no retries
pub fn client_with_limiter(server: &MockServer, limiter: RateLimiter) -> ApiClient {
    ApiClient::new(
        format!("{}{}", server.uri(), API_PREFIX),
        credentials(),
        Arc::new(limiter),
    )
    .unwrap()
    .retry_policy(RetryPolicy::new(1, Duration::from_millis(1)))
}

pub fn api_path(endpoint: &str) -> String {
    format!("{}{}", API_PREFIX, endpoint)
}

pub fn market(ticker: &str, created: &str, close: &str) -> Value {
    json!({
        "ticker": ticker,
        "event_ticker": "KXTEST-25JAN01",
        "title": format!("Market {}", ticker),
        "status": "active",
        "yes_bid": 3,
        "yes_ask": 5,
        "volume": 100,
        "created_time": created,
        "close_time": close,
    })
}

pub fn trade(id: &str, ticker: &str, ts: i64) -> Value {
    json!({
        "trade_id": id,
        "ticker": ticker,
        "yes_price": 4,
        "no_price": 96,
        "count": 10,
        "taker_side": "yes",
        "created_time": "2025-01-01T10:00:00Z",
        "ts": ts,
    })
}
