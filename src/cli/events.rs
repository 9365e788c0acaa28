//! Events command implementation

use crate::config::Config;
use crate::ingest::{summarize_artifact, write_events, EventQuery};
use crate::storage::Storage;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Only events with this status (e.g. open, closed, settled)
    #[arg(long)]
    pub status: Option<String>,

    /// Stop after N pages
    #[arg(long)]
    pub max_pages: Option<usize>,
}

impl EventsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = Arc::new(config.build_client()?);
        let storage = config.storage();
        let path = config.paths().events();

        let mut query = EventQuery::default();
        if let Some(status) = &self.status {
            query = query.status(status.clone());
        }

        let summary = write_events(client, &storage, &path, &query, self.max_pages).await?;
        let categories = summarize_artifact(&storage, &path)?;

        println!("Events: {} records in {} pages", summary.records, summary.pages);
        println!("  Path: {}", storage.uri(&summary.path));
        for (category, count) in categories {
            println!("  {:<24} {}", category, count);
        }
        Ok(())
    }
}
