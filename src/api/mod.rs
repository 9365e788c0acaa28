//! Kalshi REST API access
//!
//! Signing, rate limiting, retries and the response models shared by the
//! ingestion pipeline.

mod client;
mod error;
mod rate_limiter;
mod retry;
mod signing;
mod types;

pub use client::{
    ApiClient, Credentials, Query, DEFAULT_TIMEOUT, HEADER_ACCESS_KEY, HEADER_ACCESS_SIGNATURE,
    HEADER_ACCESS_TIMESTAMP, KALSHI_API_URL,
};
pub use error::ApiError;
pub use rate_limiter::{DeadlineExceeded, RateLimiter, DEFAULT_RATE, POLL_INTERVAL};
pub use retry::RetryPolicy;
pub use signing::{signing_message, RequestSigner, SigningError};
pub use types::{Event, EventsResponse, Market, MarketsResponse, Page, Paged, Trade, TradesResponse};

/// Endpoint paths relative to the API base URL
pub mod endpoints {
    pub const MARKETS: &str = "/markets";
    pub const TRADES: &str = "/markets/trades";
    pub const EVENTS: &str = "/events";
}
