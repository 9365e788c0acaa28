//! Ingestion pipeline
//!
//! Cursor pagination, per-market fan-out and the snapshot orchestrator
//! built on top of them.

pub mod collector;
pub mod events;
pub mod markets;
pub mod pagination;
pub mod snapshot;
pub mod trades;

pub use collector::{CollectOutcome, Collector, FetchByKey, FetchFailure, FetchOutcome};
pub use events::{category_counts, summarize_artifact, write_events, EventQuery};
pub use markets::{filter_artifact, filter_open_at, is_open_at, write_markets, DailyPull, MarketQuery};
pub use pagination::Paginator;
pub use snapshot::{SnapshotError, SnapshotOptions, SnapshotOrchestrator, SnapshotStage, SnapshotSummary};
pub use trades::TradeFetcher;

use crate::api::ApiError;
use crate::storage::StorageError;
use thiserror::Error;

/// Failure of a single pipeline step
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}
