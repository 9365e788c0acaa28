//! Columnar schemas and record <-> batch conversion
//!
//! Each record type has exactly one schema. The page-at-a-time writer and
//! the whole-table writer both go through [`Record::to_batch`], so partial
//! and complete artifacts are schema-identical. Columns may only be added
//! to these schemas, never removed or retyped.

use super::StorageError;
use crate::api::{Event, Market, Trade};
use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// A record type that can be stored as a columnar batch
pub trait Record: Sized + Send + 'static {
    /// Short name used in logs and metrics
    const KIND: &'static str;

    fn schema() -> SchemaRef;

    fn to_batch(records: &[Self]) -> Result<RecordBatch, StorageError>;

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError>;
}

fn field(name: &str, data_type: DataType, nullable: bool) -> Field {
    Field::new(name, data_type, nullable)
}

fn strings<T>(records: &[T], f: impl Fn(&T) -> Option<&str>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<StringArray>())
}

fn floats<T>(records: &[T], f: impl Fn(&T) -> Option<f64>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<Float64Array>())
}

fn ints<T>(records: &[T], f: impl Fn(&T) -> Option<i64>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<Int64Array>())
}

fn bools<T>(records: &[T], f: impl Fn(&T) -> Option<bool>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<BooleanArray>())
}

fn column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A, StorageError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StorageError::Schema(format!("missing column {}", name)))?
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| StorageError::Schema(format!("unexpected type for column {}", name)))
}

fn opt_string(array: &StringArray, i: usize) -> Option<String> {
    array.is_valid(i).then(|| array.value(i).to_string())
}

fn opt_f64(array: &Float64Array, i: usize) -> Option<f64> {
    array.is_valid(i).then(|| array.value(i))
}

fn opt_i64(array: &Int64Array, i: usize) -> Option<i64> {
    array.is_valid(i).then(|| array.value(i))
}

fn opt_bool(array: &BooleanArray, i: usize) -> Option<bool> {
    array.is_valid(i).then(|| array.value(i))
}

/// Market table schema
pub fn markets_schema() -> Schema {
    Schema::new(vec![
        field("ticker", DataType::Utf8, false),
        field("event_ticker", DataType::Utf8, false),
        field("title", DataType::Utf8, true),
        field("status", DataType::Utf8, true),
        field("market_type", DataType::Utf8, true),
        field("subtitle", DataType::Utf8, true),
        field("yes_sub_title", DataType::Utf8, true),
        field("no_sub_title", DataType::Utf8, true),
        field("series_ticker", DataType::Utf8, true),
        field("yes_bid", DataType::Float64, true),
        field("yes_ask", DataType::Float64, true),
        field("no_bid", DataType::Float64, true),
        field("no_ask", DataType::Float64, true),
        field("last_price", DataType::Float64, true),
        field("previous_yes_bid", DataType::Float64, true),
        field("previous_yes_ask", DataType::Float64, true),
        field("previous_price", DataType::Float64, true),
        field("volume", DataType::Int64, true),
        field("volume_24h", DataType::Int64, true),
        field("open_interest", DataType::Int64, true),
        field("notional_value", DataType::Int64, true),
        field("close_time", DataType::Utf8, true),
        field("open_time", DataType::Utf8, true),
        field("expiration_time", DataType::Utf8, true),
        field("expected_expiration_time", DataType::Utf8, true),
        field("latest_expiration_time", DataType::Utf8, true),
        field("created_time", DataType::Utf8, true),
        field("updated_time", DataType::Utf8, true),
        field("result", DataType::Utf8, true),
        field("settlement_value", DataType::Int64, true),
        field("can_close_early", DataType::Boolean, true),
        field("strike_type", DataType::Utf8, true),
        field("rules_primary", DataType::Utf8, true),
        field("rules_secondary", DataType::Utf8, true),
    ])
}

/// Trade table schema
pub fn trades_schema() -> Schema {
    Schema::new(vec![
        field("trade_id", DataType::Utf8, false),
        field("ticker", DataType::Utf8, false),
        field("yes_price", DataType::Float64, false),
        field("no_price", DataType::Float64, false),
        field("count", DataType::Int64, false),
        field("taker_side", DataType::Utf8, true),
        field("created_time", DataType::Utf8, true),
        field("ts", DataType::Int64, true),
    ])
}

/// Event table schema
pub fn events_schema() -> Schema {
    Schema::new(vec![
        field("event_ticker", DataType::Utf8, false),
        field("series_ticker", DataType::Utf8, true),
        field("category", DataType::Utf8, true),
        field("title", DataType::Utf8, true),
        field("sub_title", DataType::Utf8, true),
        field("mutually_exclusive", DataType::Boolean, true),
        field("collateral_return_type", DataType::Utf8, true),
        field("strike_date", DataType::Utf8, true),
        field("strike_period", DataType::Utf8, true),
    ])
}

impl Record for Market {
    const KIND: &'static str = "markets";

    fn schema() -> SchemaRef {
        Arc::new(markets_schema())
    }

    fn to_batch(records: &[Self]) -> Result<RecordBatch, StorageError> {
        let columns = vec![
            strings(records, |m| Some(m.ticker.as_str())),
            strings(records, |m| Some(m.event_ticker.as_str())),
            strings(records, |m| Some(m.title.as_str())),
            strings(records, |m| Some(m.status.as_str())),
            strings(records, |m| m.market_type.as_deref()),
            strings(records, |m| m.subtitle.as_deref()),
            strings(records, |m| m.yes_sub_title.as_deref()),
            strings(records, |m| m.no_sub_title.as_deref()),
            strings(records, |m| m.series_ticker.as_deref()),
            floats(records, |m| m.yes_bid),
            floats(records, |m| m.yes_ask),
            floats(records, |m| m.no_bid),
            floats(records, |m| m.no_ask),
            floats(records, |m| m.last_price),
            floats(records, |m| m.previous_yes_bid),
            floats(records, |m| m.previous_yes_ask),
            floats(records, |m| m.previous_price),
            ints(records, |m| m.volume),
            ints(records, |m| m.volume_24h),
            ints(records, |m| m.open_interest),
            ints(records, |m| m.notional_value),
            strings(records, |m| m.close_time.as_deref()),
            strings(records, |m| m.open_time.as_deref()),
            strings(records, |m| m.expiration_time.as_deref()),
            strings(records, |m| m.expected_expiration_time.as_deref()),
            strings(records, |m| m.latest_expiration_time.as_deref()),
            strings(records, |m| m.created_time.as_deref()),
            strings(records, |m| m.updated_time.as_deref()),
            strings(records, |m| m.result.as_deref()),
            ints(records, |m| m.settlement_value),
            bools(records, |m| m.can_close_early),
            strings(records, |m| m.strike_type.as_deref()),
            strings(records, |m| m.rules_primary.as_deref()),
            strings(records, |m| m.rules_secondary.as_deref()),
        ];

        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError> {
        let ticker = column::<StringArray>(batch, "ticker")?;
        let event_ticker = column::<StringArray>(batch, "event_ticker")?;
        let title = column::<StringArray>(batch, "title")?;
        let status = column::<StringArray>(batch, "status")?;
        let market_type = column::<StringArray>(batch, "market_type")?;
        let subtitle = column::<StringArray>(batch, "subtitle")?;
        let yes_sub_title = column::<StringArray>(batch, "yes_sub_title")?;
        let no_sub_title = column::<StringArray>(batch, "no_sub_title")?;
        let series_ticker = column::<StringArray>(batch, "series_ticker")?;
        let yes_bid = column::<Float64Array>(batch, "yes_bid")?;
        let yes_ask = column::<Float64Array>(batch, "yes_ask")?;
        let no_bid = column::<Float64Array>(batch, "no_bid")?;
        let no_ask = column::<Float64Array>(batch, "no_ask")?;
        let last_price = column::<Float64Array>(batch, "last_price")?;
        let previous_yes_bid = column::<Float64Array>(batch, "previous_yes_bid")?;
        let previous_yes_ask = column::<Float64Array>(batch, "previous_yes_ask")?;
        let previous_price = column::<Float64Array>(batch, "previous_price")?;
        let volume = column::<Int64Array>(batch, "volume")?;
        let volume_24h = column::<Int64Array>(batch, "volume_24h")?;
        let open_interest = column::<Int64Array>(batch, "open_interest")?;
        let notional_value = column::<Int64Array>(batch, "notional_value")?;
        let close_time = column::<StringArray>(batch, "close_time")?;
        let open_time = column::<StringArray>(batch, "open_time")?;
        let expiration_time = column::<StringArray>(batch, "expiration_time")?;
        let expected_expiration_time = column::<StringArray>(batch, "expected_expiration_time")?;
        let latest_expiration_time = column::<StringArray>(batch, "latest_expiration_time")?;
        let created_time = column::<StringArray>(batch, "created_time")?;
        let updated_time = column::<StringArray>(batch, "updated_time")?;
        let result = column::<StringArray>(batch, "result")?;
        let settlement_value = column::<Int64Array>(batch, "settlement_value")?;
        let can_close_early = column::<BooleanArray>(batch, "can_close_early")?;
        let strike_type = column::<StringArray>(batch, "strike_type")?;
        let rules_primary = column::<StringArray>(batch, "rules_primary")?;
        let rules_secondary = column::<StringArray>(batch, "rules_secondary")?;

        let markets = (0..batch.num_rows())
            .map(|i| Market {
                ticker: ticker.value(i).to_string(),
                event_ticker: event_ticker.value(i).to_string(),
                title: opt_string(title, i).unwrap_or_default(),
                status: opt_string(status, i).unwrap_or_default(),
                market_type: opt_string(market_type, i),
                subtitle: opt_string(subtitle, i),
                yes_sub_title: opt_string(yes_sub_title, i),
                no_sub_title: opt_string(no_sub_title, i),
                series_ticker: opt_string(series_ticker, i),
                yes_bid: opt_f64(yes_bid, i),
                yes_ask: opt_f64(yes_ask, i),
                no_bid: opt_f64(no_bid, i),
                no_ask: opt_f64(no_ask, i),
                last_price: opt_f64(last_price, i),
                previous_yes_bid: opt_f64(previous_yes_bid, i),
                previous_yes_ask: opt_f64(previous_yes_ask, i),
                previous_price: opt_f64(previous_price, i),
                volume: opt_i64(volume, i),
                volume_24h: opt_i64(volume_24h, i),
                open_interest: opt_i64(open_interest, i),
                notional_value: opt_i64(notional_value, i),
                close_time: opt_string(close_time, i),
                open_time: opt_string(open_time, i),
                expiration_time: opt_string(expiration_time, i),
                expected_expiration_time: opt_string(expected_expiration_time, i),
                latest_expiration_time: opt_string(latest_expiration_time, i),
                created_time: opt_string(created_time, i),
                updated_time: opt_string(updated_time, i),
                result: opt_string(result, i),
                settlement_value: opt_i64(settlement_value, i),
                can_close_early: opt_bool(can_close_early, i),
                strike_type: opt_string(strike_type, i),
                rules_primary: opt_string(rules_primary, i),
                rules_secondary: opt_string(rules_secondary, i),
            })
            .collect();

        Ok(markets)
    }
}

impl Record for Trade {
    const KIND: &'static str = "trades";

    fn schema() -> SchemaRef {
        Arc::new(trades_schema())
    }

    fn to_batch(records: &[Self]) -> Result<RecordBatch, StorageError> {
        let columns = vec![
            strings(records, |t| Some(t.trade_id.as_str())),
            strings(records, |t| Some(t.ticker.as_str())),
            floats(records, |t| Some(t.yes_price)),
            floats(records, |t| Some(t.no_price)),
            ints(records, |t| Some(t.count)),
            strings(records, |t| t.taker_side.as_deref()),
            strings(records, |t| t.created_time.as_deref()),
            ints(records, |t| t.ts),
        ];

        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError> {
        let trade_id = column::<StringArray>(batch, "trade_id")?;
        let ticker = column::<StringArray>(batch, "ticker")?;
        let yes_price = column::<Float64Array>(batch, "yes_price")?;
        let no_price = column::<Float64Array>(batch, "no_price")?;
        let count = column::<Int64Array>(batch, "count")?;
        let taker_side = column::<StringArray>(batch, "taker_side")?;
        let created_time = column::<StringArray>(batch, "created_time")?;
        let ts = column::<Int64Array>(batch, "ts")?;

        let trades = (0..batch.num_rows())
            .map(|i| Trade {
                trade_id: trade_id.value(i).to_string(),
                ticker: ticker.value(i).to_string(),
                yes_price: yes_price.value(i),
                no_price: no_price.value(i),
                count: count.value(i),
                taker_side: opt_string(taker_side, i),
                created_time: opt_string(created_time, i),
                ts: opt_i64(ts, i),
            })
            .collect();

        Ok(trades)
    }
}

impl Record for Event {
    const KIND: &'static str = "events";

    fn schema() -> SchemaRef {
        Arc::new(events_schema())
    }

    fn to_batch(records: &[Self]) -> Result<RecordBatch, StorageError> {
        let columns = vec![
            strings(records, |e| Some(e.event_ticker.as_str())),
            strings(records, |e| e.series_ticker.as_deref()),
            strings(records, |e| e.category.as_deref()),
            strings(records, |e| e.title.as_deref()),
            strings(records, |e| e.sub_title.as_deref()),
            bools(records, |e| e.mutually_exclusive),
            strings(records, |e| e.collateral_return_type.as_deref()),
            strings(records, |e| e.strike_date.as_deref()),
            strings(records, |e| e.strike_period.as_deref()),
        ];

        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>, StorageError> {
        let event_ticker = column::<StringArray>(batch, "event_ticker")?;
        let series_ticker = column::<StringArray>(batch, "series_ticker")?;
        let category = column::<StringArray>(batch, "category")?;
        let title = column::<StringArray>(batch, "title")?;
        let sub_title = column::<StringArray>(batch, "sub_title")?;
        let mutually_exclusive = column::<BooleanArray>(batch, "mutually_exclusive")?;
        let collateral_return_type = column::<StringArray>(batch, "collateral_return_type")?;
        let strike_date = column::<StringArray>(batch, "strike_date")?;
        let strike_period = column::<StringArray>(batch, "strike_period")?;

        let events = (0..batch.num_rows())
            .map(|i| Event {
                event_ticker: event_ticker.value(i).to_string(),
                series_ticker: opt_string(series_ticker, i),
                category: opt_string(category, i),
                title: opt_string(title, i),
                sub_title: opt_string(sub_title, i),
                mutually_exclusive: opt_bool(mutually_exclusive, i),
                collateral_return_type: opt_string(collateral_return_type, i),
                strike_date: opt_string(strike_date, i),
                strike_period: opt_string(strike_period, i),
            })
            .collect();

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_market(ticker: &str) -> Market {
        Market {
            ticker: ticker.to_string(),
            event_ticker: "EVT".to_string(),
            title: "Sample".to_string(),
            status: "active".to_string(),
            yes_bid: Some(4.0),
            volume: Some(120),
            close_time: Some("2025-01-02T00:00:00Z".to_string()),
            can_close_early: Some(false),
            ..Default::default()
        }
    }

    #[test]
    fn test_markets_schema() {
        let schema = markets_schema();
        assert_eq!(schema.fields().len(), 34);
        assert_eq!(schema.field(0).name(), "ticker");
        assert_eq!(schema.field_with_name("yes_bid").unwrap().data_type(), &DataType::Float64);
        assert_eq!(schema.field_with_name("volume").unwrap().data_type(), &DataType::Int64);
        assert_eq!(
            schema.field_with_name("can_close_early").unwrap().data_type(),
            &DataType::Boolean
        );
    }

    #[test]
    fn test_trades_and_events_schema() {
        assert_eq!(trades_schema().fields().len(), 8);
        assert_eq!(events_schema().fields().len(), 9);
    }

    #[test]
    fn test_market_batch_preserves_nulls() {
        let markets = vec![sample_market("A"), sample_market("B")];
        let batch = Market::to_batch(&markets).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema(), Market::schema());

        let back = Market::from_batch(&batch).unwrap();
        assert_eq!(back, markets);
        assert!(back[0].no_ask.is_none());
        assert!(back[0].result.is_none());
    }

    #[test]
    fn test_empty_batch() {
        let batch = Trade::to_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 8);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let batch = Event::to_batch(&[Event {
            event_ticker: "E".to_string(),
            ..Default::default()
        }])
        .unwrap();

        let err = Market::from_batch(&batch).unwrap_err();
        assert!(matches!(err, StorageError::Schema(_)));
    }
}
