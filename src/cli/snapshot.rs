//! Snapshot command implementation

use crate::config::Config;
use crate::ingest::{SnapshotOptions, SnapshotOrchestrator};
use crate::storage::Storage;
use chrono::Utc;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Snapshot instant as unix seconds (defaults to now)
    #[arg(long)]
    pub snapshot_ts: Option<i64>,

    /// Only write the market artifacts
    #[arg(long)]
    pub skip_trades: bool,

    /// Fetch trades this many seconds before the snapshot (overrides config)
    #[arg(long)]
    pub lookback_secs: Option<i64>,

    /// Stop the universe pull after N pages
    #[arg(long)]
    pub max_pages: Option<usize>,
}

impl SnapshotArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = Arc::new(config.build_client()?);
        let storage: Arc<dyn Storage> = Arc::new(config.storage());

        let options = SnapshotOptions {
            snapshot_ts: self.snapshot_ts.unwrap_or_else(|| Utc::now().timestamp()),
            skip_trades: self.skip_trades,
            trade_lookback_secs: self.lookback_secs.or(config.trades.lookback_secs),
            max_pages: self.max_pages,
        };

        let mut orchestrator = SnapshotOrchestrator::new(client, storage, config.paths())
            .with_collector(config.collector())
            .with_deadline(config.collector_budget());
        let summary = orchestrator.run(&options).await?;

        println!("{}", serde_json::to_string_pretty(&summary)?);

        if !summary.failed_tickers.is_empty() {
            eprintln!(
                "Warning: trades failed for {} markets: {}",
                summary.failed_tickers.len(),
                summary.failed_tickers.join(", ")
            );
        }

        Ok(())
    }
}
