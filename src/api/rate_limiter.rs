//! Token bucket shared by every concurrent caller
//!
//! `acquire` blocks (asynchronously) until a token is available. Waiters
//! poll the bucket on a short interval rather than queueing, so admission
//! is eventual but not FIFO. The guard only covers the refill arithmetic;
//! sleeping happens outside it.

use parking_lot::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, sleep_until, Instant};

/// Default sustained request rate (requests per second)
pub const DEFAULT_RATE: f64 = 10.0;

/// Interval between polls while the bucket is empty
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The caller's deadline passed before a token became available
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("deadline exceeded while waiting for a rate limit token")]
pub struct DeadlineExceeded;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Create a bucket that starts full
    pub fn new(rate: f64, burst: f64) -> Self {
        let burst = burst.max(1.0);
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Create a bucket with burst capacity of twice the rate
    pub fn with_rate(rate: f64) -> Self {
        Self::new(rate, rate * 2.0)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> f64 {
        self.burst
    }

    /// Refill, then take one token if available
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently in the bucket (after refill)
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
        state.last_refill = now;
    }

    /// Wait until a token is available and consume it
    pub async fn acquire(&self) {
        while !self.try_acquire() {
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Like [`acquire`](Self::acquire), but give up once `deadline` passes
    ///
    /// No token is consumed when this returns an error.
    pub async fn acquire_until(&self, deadline: Option<Instant>) -> Result<(), DeadlineExceeded> {
        let Some(deadline) = deadline else {
            self.acquire().await;
            return Ok(());
        };

        loop {
            if self.try_acquire() {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DeadlineExceeded);
            }
            sleep_until((now + POLL_INTERVAL).min(deadline)).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_rate(DEFAULT_RATE)
    }
}
