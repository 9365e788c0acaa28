//! Snapshot orchestrator
//!
//! ```text
//! FetchUniverse -> FilterSnapshot -> FetchDependents -> Done
//!       \________________\_________________\_______-> Failed
//! ```
//!
//! The universe is streamed to storage page by page, re-read and filtered
//! to the markets open at the snapshot instant, and then trades are
//! collected for the filtered set.

use super::collector::Collector;
use super::markets::{filter_artifact, write_markets, MarketQuery};
use super::trades::TradeFetcher;
use super::IngestError;
use crate::api::ApiClient;
use crate::storage::{snapshot_date, write_records, ArtifactPaths, Storage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStage {
    FetchUniverse,
    FilterSnapshot,
    FetchDependents,
    Done,
    Failed,
}

impl fmt::Display for SnapshotStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SnapshotStage::FetchUniverse => "fetch_universe",
            SnapshotStage::FilterSnapshot => "filter_snapshot",
            SnapshotStage::FetchDependents => "fetch_dependents",
            SnapshotStage::Done => "done",
            SnapshotStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A snapshot run that stopped in `stage`
#[derive(Debug, Error)]
#[error("snapshot failed during {stage}: {source}")]
pub struct SnapshotError {
    pub stage: SnapshotStage,
    #[source]
    pub source: IngestError,
}

/// Per-run settings
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    /// Snapshot instant, unix seconds
    pub snapshot_ts: i64,
    /// Stop after the snapshot market artifact
    pub skip_trades: bool,
    /// Only fetch trades newer than `snapshot_ts - lookback_secs`
    pub trade_lookback_secs: Option<i64>,
    /// Stop the universe pull after this many pages
    pub max_pages: Option<usize>,
}

impl SnapshotOptions {
    pub fn at(snapshot_ts: i64) -> Self {
        Self {
            snapshot_ts,
            ..Default::default()
        }
    }

    pub fn trade_min_ts(&self) -> Option<i64> {
        self.trade_lookback_secs
            .map(|lookback| self.snapshot_ts.saturating_sub(lookback))
    }
}

/// What a completed run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub run_id: Uuid,
    pub snapshot_ts: i64,
    pub snapshot_date: NaiveDate,
    pub all_market_count: usize,
    pub snapshot_market_count: usize,
    pub trade_count: usize,
    /// Markets with no trades in the window, or unknown to the exchange
    pub empty_tickers: usize,
    pub failed_tickers: Vec<String>,
    pub all_markets_path: String,
    pub snapshot_markets_path: String,
    pub trades_path: Option<String>,
}

/// Drives one snapshot run through its stages
pub struct SnapshotOrchestrator {
    client: Arc<ApiClient>,
    storage: Arc<dyn Storage>,
    paths: ArtifactPaths,
    collector: Collector,
    trades_budget: Option<Duration>,
    stage: SnapshotStage,
}

impl SnapshotOrchestrator {
    pub fn new(client: Arc<ApiClient>, storage: Arc<dyn Storage>, paths: ArtifactPaths) -> Self {
        Self {
            client,
            storage,
            paths,
            collector: Collector::default(),
            trades_budget: None,
            stage: SnapshotStage::FetchUniverse,
        }
    }

    pub fn with_collector(mut self, collector: Collector) -> Self {
        self.collector = collector;
        self
    }

    /// Bound trade collection to `budget`, counted from the moment it starts.
    /// Universe and filter stages are never cut short.
    pub fn with_deadline(mut self, budget: Option<Duration>) -> Self {
        self.trades_budget = budget;
        self
    }

    pub fn stage(&self) -> SnapshotStage {
        self.stage
    }

    fn enter(&mut self, stage: SnapshotStage) {
        tracing::info!(from = %self.stage, to = %stage, "Snapshot stage");
        self.stage = stage;
    }

    fn fail(&mut self, source: impl Into<IngestError>) -> SnapshotError {
        let stage = self.stage;
        let source = source.into();
        tracing::error!(stage = %stage, error = %source, "Snapshot failed");
        self.stage = SnapshotStage::Failed;
        SnapshotError { stage, source }
    }

    /// Run every stage for `options.snapshot_ts`
    pub async fn run(&mut self, options: &SnapshotOptions) -> Result<SnapshotSummary, SnapshotError> {
        let run_id = Uuid::new_v4();
        self.stage = SnapshotStage::FetchUniverse;

        let ts = options.snapshot_ts;
        let (at, date) = match DateTime::<Utc>::from_timestamp(ts, 0).zip(snapshot_date(ts)) {
            Some(parsed) => parsed,
            None => return Err(self.fail(IngestError::InvalidTimestamp(ts))),
        };

        tracing::info!(run_id = %run_id, snapshot_ts = ts, snapshot_date = %date, "Starting snapshot");

        let all_markets_path = self.paths.all_markets();
        let universe = write_markets(
            Arc::clone(&self.client),
            self.storage.as_ref(),
            &all_markets_path,
            &MarketQuery::universe(),
            options.max_pages,
        )
        .await;
        let universe = match universe {
            Ok(summary) => summary,
            Err(e) => return Err(self.fail(e)),
        };

        self.enter(SnapshotStage::FilterSnapshot);
        let open = match filter_artifact(self.storage.as_ref(), &all_markets_path, at) {
            Ok(open) => open,
            Err(e) => return Err(self.fail(e)),
        };

        let snapshot_markets_path = self.paths.snapshot_markets(date);
        if let Err(e) = write_records(self.storage.as_ref(), &snapshot_markets_path, &open) {
            return Err(self.fail(e));
        }

        let mut summary = SnapshotSummary {
            run_id,
            snapshot_ts: ts,
            snapshot_date: date,
            all_market_count: universe.records,
            snapshot_market_count: open.len(),
            trade_count: 0,
            empty_tickers: 0,
            failed_tickers: Vec::new(),
            all_markets_path,
            snapshot_markets_path,
            trades_path: None,
        };

        if options.skip_trades {
            tracing::info!("Skipping trades");
        } else {
            self.enter(SnapshotStage::FetchDependents);

            let mut collector = self.collector.clone();
            let mut fetcher = TradeFetcher::new(Arc::clone(&self.client), ts).min_ts(options.trade_min_ts());
            if let Some(budget) = self.trades_budget {
                let deadline = Instant::now() + budget;
                collector = collector.deadline(Some(deadline));
                fetcher = fetcher.deadline(Some(deadline));
            }

            let tickers: Vec<String> = open.into_iter().map(|m| m.ticker).collect();
            let collected = collector.collect(Arc::new(fetcher), tickers).await;

            let trades_path = self.paths.snapshot_trades(date);
            if let Err(e) = write_records(self.storage.as_ref(), &trades_path, &collected.records) {
                return Err(self.fail(e));
            }

            if !collected.failed.is_empty() {
                tracing::warn!(
                    failed = collected.failed.len(),
                    tickers = ?collected.failed_keys(),
                    "Trades missing for some markets"
                );
            }

            summary.trade_count = collected.records.len();
            summary.empty_tickers = collected.empty;
            summary.failed_tickers = collected.failed.into_iter().map(|f| f.key).collect();
            summary.trades_path = Some(trades_path);
        }

        self.enter(SnapshotStage::Done);
        tracing::info!(
            run_id = %run_id,
            all_markets = summary.all_market_count,
            snapshot_markets = summary.snapshot_market_count,
            trades = summary.trade_count,
            empty = summary.empty_tickers,
            failed = summary.failed_tickers.len(),
            "Snapshot complete"
        );

        Ok(summary)
    }
}
