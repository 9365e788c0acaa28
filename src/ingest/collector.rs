//! Bounded fan-out over independent identifiers
//!
//! Every identifier is fetched by its own task; a semaphore bounds how many
//! run at once. All tasks share one [`ApiClient`](crate::api::ApiClient) and
//! therefore one rate budget. A failing identifier is recorded and never
//! affects its siblings.

use crate::api::ApiError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

pub const DEFAULT_MAX_WORKERS: usize = 8;
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

const DEADLINE_ERROR: &str = "deadline exceeded before fetch completed";

/// Fetches every record belonging to one identifier
#[async_trait]
pub trait FetchByKey: Send + Sync + 'static {
    type Record: Send + 'static;

    async fn fetch(&self, key: &str) -> Result<Vec<Self::Record>, ApiError>;
}

/// An identifier that produced no usable records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub key: String,
    pub error: String,
}

/// Result of fetching one identifier
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// All pages fetched; possibly empty
    Fetched { key: String, records: Vec<T> },
    Failed(FetchFailure),
}

impl<T> FetchOutcome<T> {
    pub fn key(&self) -> &str {
        match self {
            FetchOutcome::Fetched { key, .. } => key,
            FetchOutcome::Failed(failure) => &failure.key,
        }
    }

    /// Classify a fetch result. A 404 means the identifier has nothing to
    /// return and counts as an empty fetch.
    pub fn from_result(key: String, result: Result<Vec<T>, ApiError>) -> Self {
        match result {
            Ok(records) => FetchOutcome::Fetched { key, records },
            Err(e) if e.is_not_found() => {
                tracing::debug!(key = %key, "Not found, treating as empty");
                FetchOutcome::Fetched {
                    key,
                    records: Vec::new(),
                }
            }
            Err(e) => FetchOutcome::Failed(FetchFailure {
                key,
                error: e.to_string(),
            }),
        }
    }
}

/// Aggregate result of a collection run
#[derive(Debug)]
pub struct CollectOutcome<T> {
    /// Records from every successful identifier, in completion order
    pub records: Vec<T>,
    /// Identifiers fetched successfully (including empty ones)
    pub fetched: usize,
    /// Identifiers that yielded zero records or were not found
    pub empty: usize,
    pub failed: Vec<FetchFailure>,
}

impl<T> Default for CollectOutcome<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            fetched: 0,
            empty: 0,
            failed: Vec::new(),
        }
    }
}

impl<T> CollectOutcome<T> {
    pub fn failed_keys(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.key.as_str()).collect()
    }

    fn absorb(&mut self, outcome: FetchOutcome<T>) {
        match outcome {
            FetchOutcome::Fetched { records, .. } => {
                self.fetched += 1;
                if records.is_empty() {
                    self.empty += 1;
                }
                self.records.extend(records);
            }
            FetchOutcome::Failed(failure) => {
                tracing::warn!(key = %failure.key, error = %failure.error, "Fetch failed");
                metrics::counter!(crate::telemetry::COLLECTOR_FAILURES).increment(1);
                self.failed.push(failure);
            }
        }
    }
}

/// Bounded-parallelism collector
#[derive(Debug, Clone)]
pub struct Collector {
    max_workers: usize,
    progress_every: usize,
    deadline: Option<Instant>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

impl Collector {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            progress_every: DEFAULT_PROGRESS_EVERY,
            deadline: None,
        }
    }

    /// Log progress every `n` completed identifiers
    pub fn progress_every(mut self, n: usize) -> Self {
        self.progress_every = n.max(1);
        self
    }

    /// Stop waiting for workers once `deadline` passes
    ///
    /// Identifiers still outstanding at the deadline are reported as failed.
    /// Their in-flight requests are left to finish in the background.
    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Fetch every key with at most `max_workers` fetches in flight
    pub async fn collect<F: FetchByKey>(
        &self,
        fetcher: Arc<F>,
        keys: impl IntoIterator<Item = String>,
    ) -> CollectOutcome<F::Record> {
        let mut seen = HashSet::new();
        let keys: Vec<String> = keys.into_iter().filter(|k| seen.insert(k.clone())).collect();
        let total = keys.len();
        let mut pending = seen;

        tracing::info!(total, workers = self.max_workers, "Collecting");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        for key in keys {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&fetcher);
            tasks.spawn(async move {
                // Closed once the deadline passes; queued keys never start
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return FetchOutcome::Failed(FetchFailure {
                        key,
                        error: DEADLINE_ERROR.to_string(),
                    });
                };
                let result = fetcher.fetch(&key).await;
                FetchOutcome::from_result(key, result)
            });
        }

        let mut outcome = CollectOutcome::default();
        let mut completed = 0usize;

        loop {
            let joined = match self.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        tracing::warn!(
                            outstanding = pending.len(),
                            completed,
                            "Deadline reached, abandoning outstanding fetches"
                        );
                        semaphore.close();
                        tasks.detach_all();
                        break;
                    }
                },
                None => tasks.join_next().await,
            };

            let Some(joined) = joined else { break };

            match joined {
                Ok(fetch) => {
                    pending.remove(fetch.key());
                    outcome.absorb(fetch);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Fetch task aborted");
                }
            }

            completed += 1;
            if completed % self.progress_every == 0 || completed == total {
                tracing::info!(
                    completed,
                    total,
                    records = outcome.records.len(),
                    empty = outcome.empty,
                    failed = outcome.failed.len(),
                    "Collection progress"
                );
            }
        }

        let mut leftover: Vec<String> = pending.into_iter().collect();
        leftover.sort();
        for key in leftover {
            let error = if self.deadline.is_some_and(|d| Instant::now() >= d) {
                DEADLINE_ERROR.to_string()
            } else {
                "fetch task did not complete".to_string()
            };
            outcome.absorb(FetchOutcome::Failed(FetchFailure { key, error }));
        }

        tracing::info!(
            total,
            records = outcome.records.len(),
            fetched = outcome.fetched,
            empty = outcome.empty,
            failed = outcome.failed.len(),
            "Collection finished"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns `n` records per key; fails or 404s for configured keys
    struct FakeFetcher {
        records_per_key: usize,
        failing: HashSet<String>,
        missing: HashSet<String>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(records_per_key: usize) -> Self {
            Self {
                records_per_key,
                failing: HashSet::new(),
                missing: HashSet::new(),
                delay: Duration::from_millis(10),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }
        }

        fn failing(mut self, keys: &[&str]) -> Self {
            self.failing = keys.iter().map(|k| k.to_string()).collect();
            self
        }

        fn missing(mut self, keys: &[&str]) -> Self {
            self.missing = keys.iter().map(|k| k.to_string()).collect();
            self
        }

        fn delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl FetchByKey for FakeFetcher {
        type Record = (String, usize);

        async fn fetch(&self, key: &str) -> Result<Vec<Self::Record>, ApiError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(key) {
                return Err(ApiError::Status {
                    status: 503,
                    path: "/markets/trades".to_string(),
                    body: String::new(),
                });
            }
            if self.missing.contains(key) {
                return Err(ApiError::Status {
                    status: 404,
                    path: "/markets/trades".to_string(),
                    body: String::new(),
                });
            }
            Ok((0..self.records_per_key).map(|i| (key.to_string(), i)).collect())
        }
    }

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("K{:02}", i)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_isolated() {
        let fetcher = Arc::new(FakeFetcher::new(2).failing(&["K03", "K07"]));
        let outcome = Collector::new(4).collect(fetcher, keys(10)).await;

        assert_eq!(outcome.records.len(), 16);
        assert_eq!(outcome.fetched, 8);
        assert_eq!(outcome.empty, 0);

        let mut failed = outcome.failed_keys();
        failed.sort();
        assert_eq!(failed, vec!["K03", "K07"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_keep_per_key_order() {
        let fetcher = Arc::new(FakeFetcher::new(3));
        let outcome = Collector::new(2).collect(fetcher, keys(5)).await;

        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (key, i) in outcome.records {
            by_key.entry(key).or_default().push(i);
        }
        assert_eq!(by_key.len(), 5);
        assert!(by_key.values().all(|seq| seq == &vec![0, 1, 2]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_counts_as_empty() {
        let fetcher = Arc::new(FakeFetcher::new(1).missing(&["K01"]));
        let outcome = Collector::new(8).collect(fetcher, keys(3)).await;

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.fetched, 3);
        assert_eq!(outcome.empty, 1);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_keys_are_counted() {
        let fetcher = Arc::new(FakeFetcher::new(0));
        let outcome = Collector::new(8).collect(fetcher, keys(4)).await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.empty, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallelism_is_bounded() {
        let fetcher = Arc::new(FakeFetcher::new(1));
        let outcome = Collector::new(3)
            .collect(Arc::clone(&fetcher), keys(20))
            .await;

        assert_eq!(outcome.fetched, 20);
        let peak = fetcher.peak_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in flight {}", peak);
        assert!(peak >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_keys_fetched_once() {
        let fetcher = Arc::new(FakeFetcher::new(1));
        let outcome = Collector::new(2)
            .collect(fetcher, vec!["A".to_string(), "B".to_string(), "A".to_string()])
            .await;

        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.records.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_marks_outstanding_failed() {
        // 10 keys, 2 workers, 100ms each: 5 waves need 500ms
        let fetcher = Arc::new(FakeFetcher::new(1).delay(Duration::from_millis(100)));
        let deadline = Instant::now() + Duration::from_millis(250);

        let outcome = Collector::new(2)
            .deadline(Some(deadline))
            .collect(fetcher, keys(10))
            .await;

        assert_eq!(outcome.fetched, 4);
        assert_eq!(outcome.failed.len(), 6);
        assert!(outcome.failed.iter().all(|f| f.error.contains("deadline")));
    }

    #[tokio::test]
    async fn test_no_keys() {
        let fetcher = Arc::new(FakeFetcher::new(1));
        let outcome = Collector::default().collect(fetcher, Vec::new()).await;

        assert_eq!(outcome.fetched, 0);
        assert!(outcome.failed.is_empty());
    }
}
