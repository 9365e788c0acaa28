//! Hive-style artifact layout

use chrono::{DateTime, NaiveDate, Utc};

/// Builds artifact paths under a common prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPaths {
    prefix: String,
}

impl ArtifactPaths {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    fn join(&self, rest: &str) -> String {
        if self.prefix.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{}", self.prefix, rest)
        }
    }

    /// Full market universe
    pub fn all_markets(&self) -> String {
        self.join("markets/all/data.parquet")
    }

    /// Markets open at a snapshot instant
    pub fn snapshot_markets(&self, date: NaiveDate) -> String {
        self.join(&format!("markets/snapshot_date={}/data.parquet", date.format("%Y-%m-%d")))
    }

    /// Trades collected for a snapshot
    pub fn snapshot_trades(&self, date: NaiveDate) -> String {
        self.join(&format!("trades/snapshot_date={}/data.parquet", date.format("%Y-%m-%d")))
    }

    /// Hourly pull of markets still open
    pub fn daily_markets(&self, at: DateTime<Utc>) -> String {
        self.join(&format!(
            "markets/daily/date={}/hour={}/data.parquet",
            at.format("%Y-%m-%d"),
            at.format("%H")
        ))
    }

    pub fn events(&self) -> String {
        self.join("events/data.parquet")
    }
}

/// UTC calendar date of a unix timestamp, used as the partition key
pub fn snapshot_date(snapshot_ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(snapshot_ts, 0).map(|dt| dt.date_naive())
}
