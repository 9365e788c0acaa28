//! Exchange response models

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A Kalshi market as returned by `GET /markets`
///
/// Timestamps are kept as the ISO-8601 strings the exchange sends so that
/// the stored artifact is a faithful copy of the response; they are parsed
/// only where a decision depends on them (see `ingest::markets`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub ticker: String,
    pub event_ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    pub market_type: Option<String>,
    pub subtitle: Option<String>,
    pub yes_sub_title: Option<String>,
    pub no_sub_title: Option<String>,
    pub series_ticker: Option<String>,
    pub yes_bid: Option<f64>,
    pub yes_ask: Option<f64>,
    pub no_bid: Option<f64>,
    pub no_ask: Option<f64>,
    pub last_price: Option<f64>,
    pub previous_yes_bid: Option<f64>,
    pub previous_yes_ask: Option<f64>,
    pub previous_price: Option<f64>,
    pub volume: Option<i64>,
    pub volume_24h: Option<i64>,
    pub open_interest: Option<i64>,
    pub notional_value: Option<i64>,
    pub close_time: Option<String>,
    pub open_time: Option<String>,
    pub expiration_time: Option<String>,
    pub expected_expiration_time: Option<String>,
    pub latest_expiration_time: Option<String>,
    pub created_time: Option<String>,
    pub updated_time: Option<String>,
    pub result: Option<String>,
    pub settlement_value: Option<i64>,
    pub can_close_early: Option<bool>,
    pub strike_type: Option<String>,
    pub rules_primary: Option<String>,
    pub rules_secondary: Option<String>,
}

/// A single executed trade on a market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    /// Ticker of the market the trade printed on
    pub ticker: String,
    pub yes_price: f64,
    pub no_price: f64,
    pub count: i64,
    pub taker_side: Option<String>,
    pub created_time: Option<String>,
    pub ts: Option<i64>,
}

/// An event groups one or more markets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_ticker: String,
    pub series_ticker: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub sub_title: Option<String>,
    pub mutually_exclusive: Option<bool>,
    pub collateral_return_type: Option<String>,
    pub strike_date: Option<String>,
    pub strike_period: Option<String>,
}

/// One page of a cursor-paginated collection
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub records: Vec<T>,
    /// Continuation token; `Some` iff more pages remain
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}

/// A response body that carries one page of records
pub trait Paged: DeserializeOwned + Send + 'static {
    type Record: Send + 'static;

    fn into_page(self) -> Page<Self::Record>;
}

/// The exchange signals the last page with either no cursor or an empty one
fn normalize_cursor(cursor: Option<String>) -> Option<String> {
    cursor.filter(|c| !c.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct MarketsResponse {
    #[serde(default)]
    pub markets: Vec<Market>,
    pub cursor: Option<String>,
}

impl Paged for MarketsResponse {
    type Record = Market;

    fn into_page(self) -> Page<Market> {
        Page {
            records: self.markets,
            cursor: normalize_cursor(self.cursor),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TradesResponse {
    #[serde(default)]
    pub trades: Vec<Trade>,
    pub cursor: Option<String>,
}

impl Paged for TradesResponse {
    type Record = Trade;

    fn into_page(self) -> Page<Trade> {
        Page {
            records: self.trades,
            cursor: normalize_cursor(self.cursor),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<Event>,
    pub cursor: Option<String>,
}

impl Paged for EventsResponse {
    type Record = Event;

    fn into_page(self) -> Page<Event> {
        Page {
            records: self.events,
            cursor: normalize_cursor(self.cursor),
        }
    }
}
