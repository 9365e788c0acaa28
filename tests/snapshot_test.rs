//! End-to-end snapshot tests against a mock exchange

mod common;

use chrono::{NaiveDate, TimeZone, Utc};
use longshot_ingest::api::{endpoints, Market, RateLimiter, Trade};
use longshot_ingest::ingest::{
    filter_artifact, write_markets, Collector, MarketQuery, SnapshotOptions, SnapshotOrchestrator, SnapshotStage,
};
use longshot_ingest::storage::{read_all, ArtifactPaths, LocalStorage, Storage};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 2025-01-15T00:00:00Z
const SNAPSHOT_TS: i64 = 1_736_899_200;

/// Two pages: three markets then two, with close times spread around the
/// snapshot instant
async fn mount_universe(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(common::api_path(endpoints::MARKETS)))
        .and(query_param("mve_filter", "exclude"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "markets": [
                common::market("CLOSED-EARLY", "2025-01-01T00:00:00Z", "2025-01-10T00:00:00Z"),
                common::market("OPEN-A", "2025-01-01T00:00:00Z", "2025-01-20T00:00:00Z"),
                common::market("OPEN-B", "2025-01-01T00:00:00Z", "2025-02-01T00:00:00Z"),
            ],
            "cursor": "page-2",
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(common::api_path(endpoints::MARKETS)))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "markets": [
                common::market("NOT-YET", "2025-01-16T00:00:00Z", "2025-03-01T00:00:00Z"),
                common::market("BAD-CLOSE", "2025-01-01T00:00:00Z", "sometime soon"),
            ],
        })))
        .mount(server)
        .await;
}

async fn mount_trades(server: &MockServer, ticker: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(common::api_path(endpoints::TRADES)))
        .and(query_param("ticker", ticker))
        .respond_with(response)
        .mount(server)
        .await;
}

fn trades_page(ticker: &str, n: usize) -> ResponseTemplate {
    let trades: Vec<_> = (0..n)
        .map(|i| common::trade(&format!("{}-{}", ticker, i), ticker, SNAPSHOT_TS - 60 * i as i64))
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "trades": trades }))
}

/// One page of trades `{ticker}-{first}..` linked to the next by `cursor`
fn trades_page_from(ticker: &str, first: usize, n: usize, cursor: Option<&str>) -> ResponseTemplate {
    let trades: Vec<_> = (first..first + n)
        .map(|i| common::trade(&format!("{}-{}", ticker, i), ticker, SNAPSHOT_TS - 60 * i as i64))
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "trades": trades, "cursor": cursor }))
}

async fn mount_trade_page(server: &MockServer, ticker: &str, cursor: Option<&str>, response: ResponseTemplate) {
    let mock = Mock::given(method("GET"))
        .and(path(common::api_path(endpoints::TRADES)))
        .and(query_param("ticker", ticker));
    let mock = match cursor {
        Some(cursor) => mock.and(query_param("cursor", cursor)),
        None => mock.and(query_param_is_missing("cursor")),
    };
    mock.respond_with(response).mount(server).await;
}

fn snapshot_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

#[tokio::test]
async fn test_stream_then_filter() {
    let server = MockServer::start().await;
    mount_universe(&server).await;

    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    let client = Arc::new(common::client(&server, 1));

    let summary = write_markets(client, &storage, "markets/all/data.parquet", &MarketQuery::universe(), None)
        .await
        .unwrap();

    assert_eq!(summary.records, 5);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.peak_page_records, 3);

    let at = Utc.timestamp_opt(SNAPSHOT_TS, 0).unwrap();
    let open = filter_artifact(&storage, "markets/all/data.parquet", at).unwrap();
    let tickers: Vec<&str> = open.iter().map(|m| m.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["OPEN-A", "OPEN-B", "BAD-CLOSE"]);
}

#[tokio::test]
async fn test_full_snapshot_isolates_failures() {
    let server = MockServer::start().await;
    mount_universe(&server).await;
    mount_trades(&server, "OPEN-A", trades_page("OPEN-A", 3)).await;
    mount_trades(&server, "OPEN-B", ResponseTemplate::new(500)).await;
    mount_trades(&server, "BAD-CLOSE", ResponseTemplate::new(404)).await;

    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()));
    let client = Arc::new(common::client(&server, 2));

    let mut orchestrator = SnapshotOrchestrator::new(client, Arc::clone(&storage), ArtifactPaths::new("kalshi"))
        .with_collector(Collector::new(2));
    let summary = orchestrator.run(&SnapshotOptions::at(SNAPSHOT_TS)).await.unwrap();

    assert_eq!(orchestrator.stage(), SnapshotStage::Done);
    assert_eq!(summary.snapshot_date, snapshot_date());
    assert_eq!(summary.all_market_count, 5);
    assert_eq!(summary.snapshot_market_count, 3);
    assert_eq!(summary.trade_count, 3);
    assert_eq!(summary.empty_tickers, 1);
    assert_eq!(summary.failed_tickers, vec!["OPEN-B".to_string()]);
    assert_eq!(summary.all_markets_path, "kalshi/markets/all/data.parquet");
    assert_eq!(
        summary.snapshot_markets_path,
        "kalshi/markets/snapshot_date=2025-01-15/data.parquet"
    );

    let snapshot: Vec<Market> = read_all(storage.as_ref(), &summary.snapshot_markets_path).unwrap();
    assert_eq!(snapshot.len(), 3);

    let trades_path = summary.trades_path.unwrap();
    assert_eq!(trades_path, "kalshi/trades/snapshot_date=2025-01-15/data.parquet");
    let trades: Vec<Trade> = read_all(storage.as_ref(), &trades_path).unwrap();
    assert_eq!(trades.len(), 3);
    assert!(trades.iter().all(|t| t.ticker == "OPEN-A"));
    assert_eq!(trades[0].trade_id, "OPEN-A-0");

    // Trades are bounded by the snapshot instant
    let requests = server.received_requests().await.unwrap();
    let trade_requests: Vec<_> = requests
        .iter()
        .filter(|r| r.url.path() == common::api_path(endpoints::TRADES))
        .collect();
    assert!(!trade_requests.is_empty());
    for request in trade_requests {
        let pairs: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("max_ts".to_string(), SNAPSHOT_TS.to_string())));
        assert!(pairs.iter().all(|(k, _)| k != "min_ts"));
    }
}

#[tokio::test]
async fn test_skip_trades() {
    let server = MockServer::start().await;
    mount_universe(&server).await;

    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()));
    let client = Arc::new(common::client(&server, 1));

    let options = SnapshotOptions {
        skip_trades: true,
        ..SnapshotOptions::at(SNAPSHOT_TS)
    };
    let summary = SnapshotOrchestrator::new(client, Arc::clone(&storage), ArtifactPaths::new(""))
        .run(&options)
        .await
        .unwrap();

    assert_eq!(summary.snapshot_market_count, 3);
    assert!(summary.trades_path.is_none());
    assert!(!storage.exists("trades/snapshot_date=2025-01-15/data.parquet"));

    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.path() == common::api_path(endpoints::MARKETS)));
}

#[tokio::test]
async fn test_lookback_sets_min_ts() {
    let server = MockServer::start().await;
    mount_universe(&server).await;
    for ticker in ["OPEN-A", "OPEN-B", "BAD-CLOSE"] {
        mount_trades(&server, ticker, trades_page(ticker, 1)).await;
    }

    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()));
    let client = Arc::new(common::client(&server, 1));

    let options = SnapshotOptions {
        trade_lookback_secs: Some(3600),
        ..SnapshotOptions::at(SNAPSHOT_TS)
    };
    let summary = SnapshotOrchestrator::new(client, storage, ArtifactPaths::new("p"))
        .run(&options)
        .await
        .unwrap();
    assert_eq!(summary.trade_count, 3);
    assert!(summary.failed_tickers.is_empty());

    let expected = ("min_ts".to_string(), (SNAPSHOT_TS - 3600).to_string());
    let requests = server.received_requests().await.unwrap();
    let trade_requests = requests
        .iter()
        .filter(|r| r.url.path() == common::api_path(endpoints::TRADES));
    for request in trade_requests {
        let pairs: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&expected));
    }
}

#[tokio::test]
async fn test_universe_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()));
    let client = Arc::new(common::client(&server, 1));

    let mut orchestrator = SnapshotOrchestrator::new(client, storage, ArtifactPaths::new("p"));
    let err = orchestrator.run(&SnapshotOptions::at(SNAPSHOT_TS)).await.unwrap_err();

    assert_eq!(err.stage, SnapshotStage::FetchUniverse);
    assert_eq!(orchestrator.stage(), SnapshotStage::Failed);
}

#[tokio::test]
async fn test_invalid_snapshot_ts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()));
    let client = Arc::new(common::client(&server, 1));

    let mut orchestrator = SnapshotOrchestrator::new(client, storage, ArtifactPaths::new("p"));
    let err = orchestrator.run(&SnapshotOptions::at(i64::MAX)).await.unwrap_err();

    assert_eq!(err.stage, SnapshotStage::FetchUniverse);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_multi_page_trades_keep_order_and_drop_partial_failures() {
    let server = MockServer::start().await;
    mount_universe(&server).await;
    mount_trade_page(&server, "OPEN-A", None, trades_page_from("OPEN-A", 0, 2, Some("a2"))).await;
    mount_trade_page(&server, "OPEN-A", Some("a2"), trades_page_from("OPEN-A", 2, 1, None)).await;
    mount_trade_page(&server, "OPEN-B", None, trades_page_from("OPEN-B", 0, 2, Some("b2"))).await;
    mount_trade_page(&server, "OPEN-B", Some("b2"), ResponseTemplate::new(403)).await;
    mount_trade_page(&server, "BAD-CLOSE", None, trades_page_from("BAD-CLOSE", 0, 1, None)).await;

    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()));
    let client = Arc::new(common::client(&server, 1));

    let summary = SnapshotOrchestrator::new(client, Arc::clone(&storage), ArtifactPaths::new("kalshi"))
        .run(&SnapshotOptions::at(SNAPSHOT_TS))
        .await
        .unwrap();

    assert_eq!(summary.failed_tickers, vec!["OPEN-B".to_string()]);
    assert_eq!(summary.trade_count, 4);
    assert_eq!(summary.empty_tickers, 0);

    let trades: Vec<Trade> = read_all(storage.as_ref(), summary.trades_path.as_deref().unwrap()).unwrap();
    assert!(trades.iter().all(|t| t.ticker != "OPEN-B"));

    let open_a: Vec<&str> = trades
        .iter()
        .filter(|t| t.ticker == "OPEN-A")
        .map(|t| t.trade_id.as_str())
        .collect();
    assert_eq!(open_a, vec!["OPEN-A-0", "OPEN-A-1", "OPEN-A-2"]);
}

#[tokio::test]
async fn test_deadline_only_bounds_trade_collection() {
    let server = MockServer::start().await;
    mount_universe(&server).await;
    for ticker in ["OPEN-A", "OPEN-B", "BAD-CLOSE"] {
        mount_trades(&server, ticker, trades_page(ticker, 1)).await;
    }

    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(dir.path()));
    // One token up front, then one every 500ms: the second universe page
    // waits far longer than the trade budget
    let client = Arc::new(common::client_with_limiter(&server, RateLimiter::new(2.0, 1.0)));

    let mut orchestrator = SnapshotOrchestrator::new(client, Arc::clone(&storage), ArtifactPaths::new("kalshi"))
        .with_deadline(Some(Duration::from_millis(50)));
    let summary = orchestrator.run(&SnapshotOptions::at(SNAPSHOT_TS)).await.unwrap();

    assert_eq!(orchestrator.stage(), SnapshotStage::Done);
    assert_eq!(summary.all_market_count, 5);
    assert_eq!(summary.snapshot_market_count, 3);
    assert!(storage.exists(&summary.snapshot_markets_path));

    assert_eq!(summary.trade_count, 0);
    let mut failed = summary.failed_tickers.clone();
    failed.sort();
    assert_eq!(failed, vec!["BAD-CLOSE", "OPEN-A", "OPEN-B"]);

    let trades: Vec<Trade> = read_all(storage.as_ref(), summary.trades_path.as_deref().unwrap()).unwrap();
    assert!(trades.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| r.url.path() == common::api_path(endpoints::MARKETS)));
}
