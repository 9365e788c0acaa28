//! Market universe pulls and the open-at-instant filter

use super::pagination::Paginator;
use super::IngestError;
use crate::api::{endpoints, ApiClient, ApiError, Market, MarketsResponse, Page, Query};
use crate::storage::{write_pages, RecordReader, Storage, StorageError, WriteSummary};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Largest page the markets endpoint serves
pub const MARKETS_PAGE_LIMIT: u32 = 1000;

/// Query parameters for `GET /markets`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketQuery {
    pub limit: u32,
    /// Exclude multivariate combo markets
    pub exclude_multivariate: bool,
    /// Only markets closing after this unix timestamp
    pub min_close_ts: Option<i64>,
}

impl Default for MarketQuery {
    fn default() -> Self {
        Self::universe()
    }
}

impl MarketQuery {
    /// Every non-multivariate market
    pub fn universe() -> Self {
        Self {
            limit: MARKETS_PAGE_LIMIT,
            exclude_multivariate: true,
            min_close_ts: None,
        }
    }

    pub fn min_close_ts(mut self, ts: i64) -> Self {
        self.min_close_ts = Some(ts);
        self
    }

    pub fn include_multivariate(mut self) -> Self {
        self.exclude_multivariate = false;
        self
    }

    pub fn to_query(&self) -> Query {
        let mut query = vec![("limit".to_string(), self.limit.to_string())];
        if self.exclude_multivariate {
            query.push(("mve_filter".to_string(), "exclude".to_string()));
        }
        if let Some(ts) = self.min_close_ts {
            query.push(("min_close_ts".to_string(), ts.to_string()));
        }
        query
    }
}

fn parse_time(field: &str, ticker: &str, value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value.filter(|v| !v.is_empty())?;
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(ticker, field, value, error = %e, "Unparsable timestamp, keeping market");
            None
        }
    }
}

/// Whether `market` was open at `at`
///
/// Open means created at or before `at` and closing strictly after it. A
/// missing or unparsable bound does not exclude the market.
pub fn is_open_at(market: &Market, at: DateTime<Utc>) -> bool {
    let ticker = market.ticker.as_str();

    if let Some(created) = parse_time("created_time", ticker, market.created_time.as_deref()) {
        if created > at {
            return false;
        }
    }

    if let Some(closed) = parse_time("close_time", ticker, market.close_time.as_deref()) {
        if closed <= at {
            return false;
        }
    }

    true
}

/// Keep only markets open at `at`
pub fn filter_open_at(markets: impl IntoIterator<Item = Market>, at: DateTime<Utc>) -> Vec<Market> {
    markets.into_iter().filter(|m| is_open_at(m, at)).collect()
}

/// Re-read a market artifact batch by batch, keeping markets open at `at`
pub fn filter_artifact(storage: &dyn Storage, path: &str, at: DateTime<Utc>) -> Result<Vec<Market>, StorageError> {
    let mut kept = Vec::new();
    let mut scanned = 0usize;

    for batch in RecordReader::<Market>::open(storage, path)? {
        let batch = batch?;
        scanned += batch.len();
        kept.extend(filter_open_at(batch, at));
    }

    tracing::info!(
        path,
        at = %at,
        scanned,
        kept = kept.len(),
        "Filtered markets open at snapshot"
    );

    Ok(kept)
}

/// Stream every page of `query` into `path`
///
/// `max_pages` stops early after that many pages.
pub async fn write_markets(
    client: Arc<ApiClient>,
    storage: &dyn Storage,
    path: &str,
    query: &MarketQuery,
    max_pages: Option<usize>,
) -> Result<WriteSummary, IngestError> {
    let pages = Paginator::<MarketsResponse>::new(client, endpoints::MARKETS, query.to_query()).into_stream();
    write_limited(storage, path, pages, max_pages).await
}

async fn write_limited<S>(
    storage: &dyn Storage,
    path: &str,
    pages: S,
    max_pages: Option<usize>,
) -> Result<WriteSummary, IngestError>
where
    S: futures_util::Stream<Item = Result<Page<Market>, ApiError>>,
{
    let pages = pages.take(max_pages.unwrap_or(usize::MAX)).map_err(IngestError::from);
    write_pages(storage, path, pages).await
}

/// Result of pulling the markets that are still open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyPull {
    pub write: WriteSummary,
    /// The query that produced the artifact
    pub query: MarketQuery,
}

impl DailyPull {
    /// Pull every market closing after `close_after` into `path`
    ///
    /// Some deployments reject `mve_filter` combined with `min_close_ts`
    /// with HTTP 400. In that case pagination restarts from the first page
    /// with `min_close_ts` alone.
    pub async fn run(
        client: Arc<ApiClient>,
        storage: &dyn Storage,
        path: &str,
        close_after: i64,
        max_pages: Option<usize>,
    ) -> Result<Self, IngestError> {
        let mut query = MarketQuery::universe().min_close_ts(close_after);
        let mut paginator = Paginator::<MarketsResponse>::new(client, endpoints::MARKETS, query.to_query());

        let first = match paginator.next_page().await {
            Ok(page) => page,
            Err(e) if e.status() == Some(400) => {
                tracing::warn!(error = %e, "Combined market filter rejected, retrying with min_close_ts only");
                query = query.include_multivariate();
                paginator.restart(query.to_query());
                paginator.next_page().await?
            }
            Err(e) => return Err(e.into()),
        };

        let pages = stream::iter(first.map(Ok)).chain(paginator.into_stream());
        let write = write_limited(storage, path, pages, max_pages).await?;

        Ok(Self { write, query })
    }
}
