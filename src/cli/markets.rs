//! Markets and daily-markets command implementations

use crate::config::Config;
use crate::ingest::{write_markets, DailyPull, MarketQuery};
use crate::storage::Storage;
use chrono::Utc;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct MarketsArgs {
    /// Stop after N pages
    #[arg(long)]
    pub max_pages: Option<usize>,
}

impl MarketsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = Arc::new(config.build_client()?);
        let storage = config.storage();
        let path = config.paths().all_markets();

        let summary = write_markets(client, &storage, &path, &MarketQuery::universe(), self.max_pages).await?;

        println!("Markets: {} records in {} pages", summary.records, summary.pages);
        println!("  Path: {}", storage.uri(&summary.path));
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DailyMarketsArgs {
    /// Only markets closing after this unix timestamp (defaults to now)
    #[arg(long)]
    pub min_close_ts: Option<i64>,

    /// Stop after N pages
    #[arg(long)]
    pub max_pages: Option<usize>,
}

impl DailyMarketsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let now = Utc::now();
        let close_after = self.min_close_ts.unwrap_or_else(|| now.timestamp());

        let client = Arc::new(config.build_client()?);
        let storage = config.storage();
        let path = config.paths().daily_markets(now);

        let pull = DailyPull::run(client, &storage, &path, close_after, self.max_pages).await?;

        println!(
            "Daily markets: {} records in {} pages",
            pull.write.records, pull.write.pages
        );
        println!("  Path: {}", storage.uri(&pull.write.path));
        println!(
            "  Filter: min_close_ts={} mve_filter={}",
            close_after,
            if pull.query.exclude_multivariate { "exclude" } else { "none" }
        );
        Ok(())
    }
}
