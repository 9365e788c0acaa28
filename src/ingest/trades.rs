//! Per-market trade history

use super::collector::FetchByKey;
use super::pagination::Paginator;
use crate::api::{endpoints, ApiClient, ApiError, Query, Trade, TradesResponse};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;

/// Largest page the trades endpoint serves
pub const TRADES_PAGE_LIMIT: u32 = 1000;

/// Fetches every trade of one market inside a time window
#[derive(Debug, Clone)]
pub struct TradeFetcher {
    client: Arc<ApiClient>,
    min_ts: Option<i64>,
    max_ts: i64,
    deadline: Option<Instant>,
}

impl TradeFetcher {
    /// Trades printed at or before `max_ts`
    pub fn new(client: Arc<ApiClient>, max_ts: i64) -> Self {
        Self {
            client,
            min_ts: None,
            max_ts,
            deadline: None,
        }
    }

    /// Also bound the window from below
    pub fn min_ts(mut self, min_ts: Option<i64>) -> Self {
        self.min_ts = min_ts;
        self
    }

    /// Stop waiting for rate limit tokens once `deadline` passes
    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn query(&self, ticker: &str) -> Query {
        let mut query = vec![
            ("ticker".to_string(), ticker.to_string()),
            ("limit".to_string(), TRADES_PAGE_LIMIT.to_string()),
            ("max_ts".to_string(), self.max_ts.to_string()),
        ];
        if let Some(min_ts) = self.min_ts {
            query.push(("min_ts".to_string(), min_ts.to_string()));
        }
        query
    }
}

#[async_trait]
impl FetchByKey for TradeFetcher {
    type Record = Trade;

    /// All pages for `ticker`, in API order. Any page error discards what
    /// was fetched so far.
    async fn fetch(&self, ticker: &str) -> Result<Vec<Trade>, ApiError> {
        let mut pages = Paginator::<TradesResponse>::new(Arc::clone(&self.client), endpoints::TRADES, self.query(ticker))
            .deadline(self.deadline);
        let trades = pages.collect_all().await?;

        tracing::debug!(ticker, trades = trades.len(), pages = pages.pages_fetched(), "Fetched trades");
        Ok(trades)
    }
}
