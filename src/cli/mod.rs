//! CLI interface for longshot-ingest
//!
//! Provides subcommands for:
//! - `snapshot`: Markets open at an instant plus their trades
//! - `markets`: Full market universe
//! - `daily-markets`: Markets still open, partitioned by pull hour
//! - `events`: Full event universe
//! - `config`: Show the effective configuration

mod events;
mod markets;
mod snapshot;

pub use events::EventsArgs;
pub use markets::{DailyMarketsArgs, MarketsArgs};
pub use snapshot::SnapshotArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "longshot-ingest")]
#[command(about = "Ingest Kalshi markets, events and trades into Parquet")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Snapshot markets open at an instant and collect their trades
    Snapshot(SnapshotArgs),
    /// Stream the full market universe
    Markets(MarketsArgs),
    /// Pull markets closing after now
    DailyMarkets(DailyMarketsArgs),
    /// Stream the full event universe
    Events(EventsArgs),
    /// Show the effective configuration
    Config,
}
