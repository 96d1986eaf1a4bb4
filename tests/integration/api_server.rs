//! Integration tests for the API Server
//!
//! Tests HTTP endpoints, the error taxonomy, and the auth/rate-limit
//! policies.

#[path = "api_server/test_utils.rs"]
mod test_utils;

use axum::http::{HeaderName, HeaderValue};
use serde_json::{json, Value};

use test_utils::{uptrend_candles, TestApiServer};

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "signalis-signal-engine");
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    assert!(
        body.contains("http_requests_total"),
        "Expected http_requests_total metric"
    );
    assert!(
        body.contains("http_request_duration_seconds"),
        "Expected http_request_duration_seconds metric"
    );
    assert!(
        body.contains("signal_compositions_total"),
        "Expected signal_compositions_total metric"
    );
}

#[tokio::test]
async fn compose_rejects_invalid_symbols() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .post("/api/signal")
        .json(&json!({"symbol": "btc-usd!", "timeframe": "1h"}))
        .await;
    assert_eq!(response.status_code(), 400);

    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error_code"], "INVALID_SYMBOL");
}

#[tokio::test]
async fn compose_rejects_unknown_timeframes() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .post("/api/signal")
        .json(&json!({"symbol": "BTCUSDT", "timeframe": "7m"}))
        .await;
    assert_eq!(response.status_code(), 400);

    let body: Value = response.json();
    assert_eq!(body["error_code"], "INVALID_TIMEFRAME");
}

#[tokio::test]
async fn compose_reports_missing_market_data() {
    let app = TestApiServer::new().await;
    let response = app
        .server
        .post("/api/signal")
        .json(&json!({"symbol": "BTCUSDT", "timeframe": "1h"}))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error_code"], "NO_MARKET_DATA");
}

#[tokio::test]
async fn compose_returns_a_signal_for_a_trending_market() {
    let app = TestApiServer::with_candles(uptrend_candles(250)).await;
    let response = app
        .server
        .post("/api/signal")
        .json(&json!({"symbol": "BTCUSDT", "timeframe": "1h"}))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["signal"]["symbol"], "BTCUSDT");
    assert_eq!(body["signal"]["action"], "BUY");

    let confidence = body["signal"]["confidence"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&confidence));

    let entry = body["signal"]["entry_price"].as_f64().unwrap();
    let tp = body["signal"]["take_profit"].as_f64().unwrap();
    let sl = body["signal"]["stop_loss"].as_f64().unwrap();
    assert!(tp > entry);
    assert!(sl < entry);

    assert!(body["signal"]["reasoning"].as_str().is_some());
    assert!(body["actionable"].as_bool().is_some());
    assert!(body["threshold"]["effective"].as_f64().is_some());
}

#[tokio::test]
async fn history_endpoints_report_store_unavailable_without_database() {
    let app = TestApiServer::new().await;

    let response = app.server.get("/api/signals").await;
    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "STORE_UNAVAILABLE");

    let response = app.server.get("/api/signals/some-id").await;
    assert_eq!(response.status_code(), 503);

    let response = app.server.post("/api/threshold/evaluate").await;
    assert_eq!(response.status_code(), 503);
}

#[tokio::test]
async fn threshold_endpoint_reports_state_within_bounds() {
    let app = TestApiServer::new().await;
    let response = app.server.get("/api/threshold").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    let current = body["threshold"]["current"].as_f64().unwrap();
    let min = body["threshold"]["min"].as_f64().unwrap();
    let max = body["threshold"]["max"].as_f64().unwrap();
    assert!(current >= min && current <= max);
    assert!(body["recent_adjustments"].as_array().is_some());
}

#[tokio::test]
async fn api_requests_without_the_key_are_unauthorized() {
    let app = TestApiServer::with_api_key("secret").await;

    let response = app.server.get("/api/threshold").await;
    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "UNAUTHORIZED");

    // Probes and scrapers stay open
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn api_requests_with_the_key_are_accepted() {
    let app = TestApiServer::with_api_key("secret").await;
    let response = app
        .server
        .get("/api/threshold")
        .add_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("secret"),
        )
        .await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let app = TestApiServer::with_api_key("secret").await;
    let response = app
        .server
        .get("/api/threshold")
        .add_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("wrong"),
        )
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn exceeding_the_rate_limit_returns_429() {
    let app = TestApiServer::with_rate_limit(2).await;

    assert_eq!(app.server.get("/api/threshold").await.status_code(), 200);
    assert_eq!(app.server.get("/api/threshold").await.status_code(), 200);

    let response = app.server.get("/api/threshold").await;
    assert_eq!(response.status_code(), 429);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "RATE_LIMITED");

    // Health is not rate limited
    assert_eq!(app.server.get("/health").await.status_code(), 200);
}
