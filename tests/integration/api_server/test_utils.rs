//! Test utilities for API server integration tests

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, Duration, Utc};
use signalis::core::http::{create_router, AppState, AuthPolicy, HealthStatus, RateLimiter};
use signalis::metrics::Metrics;
use signalis::models::{Candle, ThresholdState, Timeframe};
use signalis::services::market_data::MarketDataProvider;
use signalis::services::{NarrativeClient, TelegramNotifier};
use signalis::signals::SignalComposer;
use signalis::threshold::{DynamicThreshold, InMemoryThresholdStore, ThresholdConfig};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Provider that serves a fixed candle window
pub struct StaticProvider {
    candles: Vec<Candle>,
}

impl StaticProvider {
    pub fn empty() -> Self {
        Self {
            candles: Vec::new(),
        }
    }

    pub fn with_candles(candles: Vec<Candle>) -> Self {
        Self { candles }
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    async fn get_candles(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        limit: usize,
        _end_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, Box<dyn std::error::Error + Send + Sync>> {
        let start = self.candles.len().saturating_sub(limit);
        Ok(self.candles[start..].to_vec())
    }

    async fn get_latest_price(
        &self,
        _symbol: &str,
    ) -> Result<Option<f64>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.candles.last().map(|c| c.close))
    }
}

pub fn uptrend_candles(count: usize) -> Vec<Candle> {
    let base = Utc::now() - Duration::hours(count as i64);
    (0..count)
        .map(|i| {
            let price = 100.0 + i as f64;
            Candle::new(
                price,
                price + 0.6,
                price - 0.4,
                price + 0.4,
                1000.0 + i as f64 * 25.0,
                base + Duration::hours(i as i64),
            )
        })
        .collect()
}

/// Test helper for API server integration tests
#[allow(dead_code)]
pub struct TestApiServer {
    pub server: TestServer,
    pub metrics: Arc<Metrics>,
}

impl TestApiServer {
    pub async fn new() -> Self {
        Self::build(Arc::new(StaticProvider::empty()), AuthPolicy::disabled(), 10_000).await
    }

    pub async fn with_candles(candles: Vec<Candle>) -> Self {
        Self::build(
            Arc::new(StaticProvider::with_candles(candles)),
            AuthPolicy::disabled(),
            10_000,
        )
        .await
    }

    pub async fn with_api_key(api_key: &str) -> Self {
        Self::build(
            Arc::new(StaticProvider::empty()),
            AuthPolicy::new(Some(api_key.to_string())),
            10_000,
        )
        .await
    }

    pub async fn with_rate_limit(max_per_minute: u32) -> Self {
        Self::build(
            Arc::new(StaticProvider::empty()),
            AuthPolicy::disabled(),
            max_per_minute,
        )
        .await
    }

    async fn build(
        provider: Arc<dyn MarketDataProvider>,
        auth: AuthPolicy,
        rate_limit: u32,
    ) -> Self {
        let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
        let store = Arc::new(InMemoryThresholdStore::with_state(ThresholdState::new(
            60.0,
            Utc::now(),
        )));
        let threshold = Arc::new(DynamicThreshold::new(ThresholdConfig::default(), store));

        let state = AppState {
            health: Arc::new(RwLock::new(HealthStatus::default())),
            metrics: metrics.clone(),
            start_time: Arc::new(Instant::now()),
            provider,
            database: None,
            composer: Arc::new(SignalComposer::default()),
            threshold,
            narrative: Arc::new(NarrativeClient::new(None)),
            notifier: Arc::new(TelegramNotifier::new(None, None)),
            auth,
            rate_limiter: Arc::new(RateLimiter::per_minute(rate_limit)),
        };

        let app = create_router(state);
        let server = TestServer::new(app).expect("start test server");

        Self { server, metrics }
    }
}
