//! Retry policy with exponential backoff and jitter
//!
//! Attempt `n` (1-based) that fails with a retryable error waits
//! `base_delay * 2^(n-1) + U(0, jitter * base_delay)` before attempt
//! `n + 1`. The last error is returned once `max_attempts` is reached;
//! errors rejected by the predicate are returned immediately.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry configuration for a single logical call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt, before jitter
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter, as a fraction of `base_delay`
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    /// Delay without jitter after failed attempt `attempt` (1-based)
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    /// Delay with jitter after failed attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let max_jitter = self.base_delay.as_secs_f64() * self.jitter;
        let jitter = if max_jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..max_jitter)
        } else {
            0.0
        };
        self.base_backoff(attempt) + Duration::from_secs_f64(jitter)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent
    ///
    /// `op` receives the 1-based attempt number and must rebuild any
    /// per-attempt state (timestamps, signatures) itself.
    pub async fn run<T, E, F, Fut>(&self, is_retryable: impl Fn(&E) -> bool, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying"
                    );
                    metrics::counter!(crate::telemetry::API_RETRIES).increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
