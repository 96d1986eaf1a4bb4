//! Integration tests for the exchange REST client against a mock venue

use serde_json::json;
use signalis::models::Timeframe;
use signalis::services::market_data::MarketDataProvider;
use signalis::services::ExchangeRestClient;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn kline_row(open_time_ms: i64, open: &str, high: &str, low: &str, close: &str, volume: &str) -> serde_json::Value {
    json!([
        open_time_ms,
        open,
        high,
        low,
        close,
        volume,
        open_time_ms + 3_599_999,
        "0",
        0,
        "0",
        "0",
        "0"
    ])
}

#[tokio::test]
async fn parses_klines_into_ordered_candles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("interval", "1h"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            kline_row(1_717_243_200_000, "100.0", "101.0", "99.0", "100.5", "1200.0"),
            kline_row(1_717_246_800_000, "100.5", "102.0", "100.0", "101.5", "1500.0"),
            kline_row(1_717_250_400_000, "101.5", "103.0", "101.0", "102.5", "1800.0"),
        ])))
        .mount(&server)
        .await;

    let client = ExchangeRestClient::with_client(server.uri(), reqwest::Client::new());
    let candles = client
        .get_candles("BTCUSDT", Timeframe::H1, 10, None)
        .await
        .expect("candles should parse");

    assert_eq!(candles.len(), 3);
    assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(candles[0].open, 100.0);
    assert_eq!(candles[0].high, 101.0);
    assert_eq!(candles[2].close, 102.5);
    assert_eq!(candles[2].volume, 1800.0);
}

#[tokio::test]
async fn malformed_rows_are_skipped_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            kline_row(1_717_243_200_000, "100.0", "101.0", "99.0", "100.5", "1200.0"),
            json!([1_717_246_800_000_i64, "not-a-number", "102.0", "100.0", "101.5", "1500.0", 0, "0", 0, "0", "0", "0"]),
            json!(["too", "short"]),
            kline_row(1_717_250_400_000, "101.5", "103.0", "101.0", "102.5", "1800.0"),
        ])))
        .mount(&server)
        .await;

    let client = ExchangeRestClient::with_client(server.uri(), reqwest::Client::new());
    let candles = client
        .get_candles("BTCUSDT", Timeframe::H1, 10, None)
        .await
        .expect("partial data should still parse");

    assert_eq!(candles.len(), 2);
}

#[tokio::test]
async fn empty_response_yields_an_empty_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = ExchangeRestClient::with_client(server.uri(), reqwest::Client::new());
    let candles = client
        .get_candles("BTCUSDT", Timeframe::H1, 10, None)
        .await
        .expect("empty body is not an error");

    assert!(candles.is_empty());
}

#[tokio::test]
async fn server_errors_are_retried_once_then_surface() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2) // initial attempt plus exactly one retry
        .mount(&server)
        .await;

    let client = ExchangeRestClient::with_client(server.uri(), reqwest::Client::new());
    let result = client.get_candles("BTCUSDT", Timeframe::H1, 10, None).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn end_time_is_forwarded_to_the_venue() {
    let server = MockServer::start().await;
    let end = chrono::DateTime::from_timestamp_millis(1_717_250_400_000).unwrap();
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("endTime", "1717250400000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ExchangeRestClient::with_client(server.uri(), reqwest::Client::new());
    let result = client
        .get_candles("BTCUSDT", Timeframe::H1, 10, Some(end))
        .await;

    assert!(result.is_ok());
}
