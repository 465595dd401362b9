//! Adapter Integration Tests
//!
//! Exercises the concrete collaborators (filesystem object store, SQLite
//! run log, outbox and HTTP notifiers, provider client) and one full cycle
//! wired from them against a local stub provider.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use marketfeed::adapters::object_store::sha256_hex;
use marketfeed::adapters::{
    AcquisitionClient, AlphaVantageClient, FsObjectStore, HttpNotifier, Notifier, ObjectStore,
    OutboxNotifier, RunLog, SqliteRunLog,
};
use marketfeed::domain::StorageArtifact;
use marketfeed::{Dataset, DatasetKind, NotificationError, Orchestrator, RunRecord, RunStatus};

const STOCK_BODY: &str = r#"{
    "Meta Data": {
        "1. Information": "Weekly Adjusted Prices and Volumes",
        "2. Symbol": "IBM",
        "3. Last Refreshed": "2024-07-26",
        "4. Time Zone": "US/Eastern"
    },
    "Weekly Adjusted Time Series": {
        "2024-07-26": {
            "1. open": "185.1000",
            "2. high": "196.2600",
            "3. low": "184.4300",
            "4. close": "191.7500",
            "5. adjusted close": "191.7500",
            "6. volume": "38286420",
            "7. dividend amount": "0.0000"
        }
    }
}"#;

const NEWS_BODY: &str = r#"{
    "items": "1",
    "sentiment_score_definition": "x <= -0.35: Bearish",
    "relevance_score_definition": "0 < x <= 1",
    "feed": [{
        "title": "IBM beats estimates",
        "url": "https://example.com/ibm",
        "time_published": "20240725T120000",
        "authors": ["Reporter"],
        "summary": "Quarterly results.",
        "source": "Wire",
        "overall_sentiment_score": 0.31,
        "overall_sentiment_label": "Somewhat-Bullish",
        "ticker_sentiment": [{
            "ticker": "IBM",
            "relevance_score": "0.9",
            "ticker_sentiment_score": "0.4",
            "ticker_sentiment_label": "Bullish"
        }]
    }]
}"#;

fn cycle_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 25).unwrap()
}

/// Decide a response from the raw request text
type Responder = fn(&str) -> (u16, String);

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}

/// Minimal HTTP/1.1 server answering every connection with `responder`.
/// Returns the base URL.
async fn serve(responder: Responder) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 16 * 1024];
                let mut read = 0;
                loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    let text = String::from_utf8_lossy(&buf[..read]);
                    if let Some(end) = text.find("\r\n\r\n") {
                        let content_length = text[..end]
                            .lines()
                            .find_map(|l| {
                                let lower = l.to_ascii_lowercase();
                                lower
                                    .strip_prefix("content-length:")
                                    .and_then(|v| v.trim().parse::<usize>().ok())
                            })
                            .unwrap_or(0);
                        if read >= end + 4 + content_length {
                            break;
                        }
                    }
                }

                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let (status, body) = responder(&request);
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    status_text(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/query", addr)
}

/// Behaves like the provider when given the expected credentials
fn provider(request: &str) -> (u16, String) {
    let lower = request.to_ascii_lowercase();
    if !lower.contains("apikey=token") || !lower.contains("authorization: bearer token") {
        return (403, r#"{"Error Message": "invalid api key"}"#.to_string());
    }
    if request.contains("function=TIME_SERIES_WEEKLY_ADJUSTED") && request.contains("symbol=IBM") {
        (200, STOCK_BODY.to_string())
    } else if request.contains("function=NEWS_SENTIMENT") && request.contains("tickers=IBM") {
        (200, NEWS_BODY.to_string())
    } else {
        (500, "{}".to_string())
    }
}

/// Serves stock data but rejects news requests
fn provider_without_news(request: &str) -> (u16, String) {
    if request.contains("function=NEWS_SENTIMENT") {
        (403, r#"{"Information": "premium endpoint"}"#.to_string())
    } else {
        provider(request)
    }
}

fn always_unavailable(_request: &str) -> (u16, String) {
    (503, "bus down".to_string())
}

fn always_ok(_request: &str) -> (u16, String) {
    (200, "{}".to_string())
}

fn client(base_url: String) -> AlphaVantageClient {
    AlphaVantageClient::new(base_url, "TOKEN", "IBM", Duration::from_secs(5)).unwrap()
}

// ============================================================================
// Object store
// ============================================================================

#[tokio::test]
async fn test_object_store_writes_atomically() {
    let temp = TempDir::new().unwrap();
    let store = FsObjectStore::new(temp.path(), "market-data");

    let bytes = br#"{"feed":[]}"#.to_vec();
    let artifact = StorageArtifact::new(DatasetKind::News, cycle_date(), bytes.clone());
    let stored = assert_ok!(store.write(artifact).await);

    assert_eq!(stored.name, "news_data_2024-07-25");
    assert_eq!(stored.size_bytes, bytes.len() as u64);
    assert_eq!(stored.sha256.as_deref(), Some(sha256_hex(&bytes).as_str()));
    assert!(stored.location.starts_with("file://"));
    assert!(stored.location.ends_with("market-data/news_data_2024-07-25"));

    let read_back = store.read("news_data_2024-07-25").await.unwrap();
    assert_eq!(read_back, Some(bytes));

    // No temporary files are left behind
    let entries: Vec<_> = std::fs::read_dir(store.bucket_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec!["news_data_2024-07-25"]);
}

#[tokio::test]
async fn test_object_store_overwrites_same_name() {
    let temp = TempDir::new().unwrap();
    let store = FsObjectStore::new(temp.path(), "market-data");

    for payload in [b"first".to_vec(), b"second".to_vec()] {
        let artifact = StorageArtifact::new(DatasetKind::Stock, cycle_date(), payload);
        assert_ok!(store.write(artifact).await);
    }

    let read_back = store.read("stock_data_2024-07-25").await.unwrap();
    assert_eq!(read_back, Some(b"second".to_vec()));
}

#[tokio::test]
async fn test_object_store_rejects_nested_names() {
    let temp = TempDir::new().unwrap();
    let store = FsObjectStore::new(temp.path(), "market-data");

    let artifact = StorageArtifact {
        kind: DatasetKind::Stock,
        name: "../escape".to_string(),
        bytes: b"{}".to_vec(),
    };
    let err = assert_err!(store.write(artifact).await);
    assert_eq!(err.name, "../escape");
    assert!(!temp.path().join("escape").exists());
}

// ============================================================================
// Run log
// ============================================================================

#[tokio::test]
async fn test_run_log_persists_across_reopen() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("state").join("runs.db");
    let cycle = Uuid::new_v4();

    {
        let log = SqliteRunLog::open(&db_path).unwrap();
        assert_ok!(
            log.append(&RunRecord::success(cycle, cycle_date(), "file:///a/stock"))
                .await
        );
        assert_ok!(
            log.append(&RunRecord::success(cycle, cycle_date(), "file:///a/news"))
                .await
        );
        assert_ok!(
            log.append(&RunRecord::failure(Uuid::new_v4(), cycle_date(), "timeout"))
                .await
        );
    }

    let log = SqliteRunLog::open(&db_path).unwrap();

    let recent = log.recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].status, RunStatus::Failure);
    assert_eq!(recent[0].location_or_reason, "timeout");
    assert_eq!(recent[1].location_or_reason, "file:///a/news");

    let cycle_records = log.for_cycle(cycle).await.unwrap();
    assert_eq!(cycle_records.len(), 2);
    assert_eq!(cycle_records[0].location_or_reason, "file:///a/stock");
    assert!(cycle_records.iter().all(|r| r.date == cycle_date()));
}

// ============================================================================
// Notifiers
// ============================================================================

#[tokio::test]
async fn test_outbox_appends_one_line_per_message() {
    let temp = TempDir::new().unwrap();
    let notifier = OutboxNotifier::new(temp.path().join("outbox.jsonl"), "stock");

    assert_ok!(notifier.publish("Data saved successfully for 2024-07-25").await);
    assert_ok!(notifier.publish("Data saving failed for 2024-07-26: timeout").await);

    let messages = notifier.read_all().await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.topic == "stock"));
    assert_eq!(messages[1].message, "Data saving failed for 2024-07-26: timeout");
}

#[tokio::test]
async fn test_outbox_rejects_empty_message() {
    let temp = TempDir::new().unwrap();
    let notifier = OutboxNotifier::new(temp.path().join("outbox.jsonl"), "stock");

    let err = assert_err!(notifier.publish("  ").await);
    assert!(matches!(err, NotificationError::EmptyMessage));
    assert!(!notifier.outbox_path().exists());
}

#[tokio::test]
async fn test_http_notifier_reports_bridge_rejection() {
    let down = serve(always_unavailable).await;
    let notifier = HttpNotifier::new(down, "stock");

    let err = assert_err!(notifier.publish("Data saved successfully for 2024-07-25").await);
    match err {
        NotificationError::Transport { topic, reason } => {
            assert_eq!(topic, "stock");
            assert!(reason.contains("503"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }

    let up = serve(always_ok).await;
    let notifier = HttpNotifier::new(up, "stock");
    assert_ok!(notifier.publish("Data saved successfully for 2024-07-25").await);
}

// ============================================================================
// Provider client
// ============================================================================

#[tokio::test]
async fn test_provider_decodes_both_datasets() {
    let client = client(serve(provider).await);

    match assert_ok!(client.fetch(DatasetKind::Stock).await) {
        Dataset::Stock(series) => {
            assert_eq!(series.meta_data.unwrap().symbol, "IBM");
            assert_eq!(series.weekly["2024-07-26"].close, "191.7500");
        }
        other => panic!("expected stock data, got {:?}", other.kind()),
    }

    match assert_ok!(client.fetch(DatasetKind::News).await) {
        Dataset::News(feed) => {
            assert_eq!(feed.feed.len(), 1);
            assert_eq!(feed.feed[0].ticker_sentiment[0].ticker, "IBM");
        }
        other => panic!("expected news data, got {:?}", other.kind()),
    }
}

#[tokio::test]
async fn test_provider_client_error_carries_status() {
    let client = AlphaVantageClient::new(
        serve(provider).await,
        "WRONG",
        "IBM",
        Duration::from_secs(5),
    )
    .unwrap();

    let err = assert_err!(client.fetch(DatasetKind::Stock).await);
    assert_eq!(err.kind, DatasetKind::Stock);
    assert_eq!(err.status, Some(403));
}

#[tokio::test]
async fn test_provider_server_error_has_no_status() {
    let client = client(serve(always_unavailable).await);

    let err = assert_err!(client.fetch(DatasetKind::News).await);
    assert_eq!(err.kind, DatasetKind::News);
    assert_eq!(err.status, None);
    assert!(err.cause.contains("503"));
}

// ============================================================================
// Full cycle over concrete adapters
// ============================================================================

struct Wiring {
    _temp: TempDir,
    store: Arc<FsObjectStore>,
    run_log: Arc<SqliteRunLog>,
    outbox: Arc<OutboxNotifier>,
    orchestrator: Orchestrator,
}

async fn wire(responder: Responder) -> Wiring {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FsObjectStore::new(temp.path().join("objects"), "market-data"));
    let run_log = Arc::new(SqliteRunLog::open(temp.path().join("runs.db")).unwrap());
    let outbox = Arc::new(OutboxNotifier::new(temp.path().join("outbox.jsonl"), "stock"));
    let orchestrator = Orchestrator::new(
        Arc::new(client(serve(responder).await)),
        store.clone(),
        run_log.clone(),
        outbox.clone(),
    )
    .with_clock(cycle_date);

    Wiring {
        _temp: temp,
        store,
        run_log,
        outbox,
        orchestrator,
    }
}

#[tokio::test]
async fn test_cycle_over_filesystem_and_sqlite() {
    let wiring = wire(provider).await;

    let outcome = assert_ok!(wiring.orchestrator.run_cycle().await);
    assert!(outcome.is_success());

    let stock = wiring.store.read("stock_data_2024-07-25").await.unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_slice(&stock).unwrap();
    assert_eq!(stored["Meta Data"]["2. Symbol"], "IBM");
    assert!(wiring.store.read("news_data_2024-07-25").await.unwrap().is_some());

    let records = wiring.run_log.for_cycle(outcome.cycle_id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == RunStatus::Success));
    assert!(records.iter().all(|r| r.location_or_reason.starts_with("file://")));

    let messages = wiring.outbox.read_all().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message, "Data saved successfully for 2024-07-25");
}

#[tokio::test]
async fn test_cycle_rejected_news_writes_nothing() {
    let wiring = wire(provider_without_news).await;

    let outcome = assert_ok!(wiring.orchestrator.run_cycle().await);
    assert!(!outcome.is_success());

    assert!(wiring.store.read("stock_data_2024-07-25").await.unwrap().is_none());
    assert!(wiring.store.read("news_data_2024-07-25").await.unwrap().is_none());

    let records = wiring.run_log.recent(10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RunStatus::Failure);
    assert!(records[0].location_or_reason.contains("news"));
    assert!(records[0].location_or_reason.contains("403"));

    let messages = wiring.outbox.read_all().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].message.starts_with("Data saving failed for 2024-07-25:"));
}
