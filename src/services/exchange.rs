//! Exchange REST client for OHLCV data
//!
//! Talks a Binance-style klines endpoint. The base URL is injectable so
//! tests can point it at a local mock server.

use crate::cache::{candles_key, RedisCache};
use crate::config;
use crate::models::{Candle, Timeframe};
use crate::services::market_data::MarketDataProvider;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CACHE_TTL_SECONDS: u64 = 30;

pub struct ExchangeRestClient {
    base_url: String,
    client: reqwest::Client,
    cache: Option<Arc<RedisCache>>,
}

impl ExchangeRestClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: config::get_exchange_base_url(),
            client,
            cache: None,
        }
    }

    /// Construct with an explicit base URL and client (used by tests to
    /// target a mock server)
    pub fn with_client(base_url: String, client: reqwest::Client) -> Self {
        Self {
            base_url,
            client,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<RedisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, Box<dyn std::error::Error + Send + Sync>> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol,
            timeframe.as_str(),
            limit
        );
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={}", end.timestamp_millis()));
        }

        let response = self.client.get(&url).send().await.map_err(|e| {
            Box::new(std::io::Error::other(format!(
                "Exchange request failed: {}",
                e
            ))) as Box<dyn std::error::Error + Send + Sync>
        })?;

        if !response.status().is_success() {
            return Err(Box::new(std::io::Error::other(format!(
                "Exchange returned status {}",
                response.status()
            ))) as Box<dyn std::error::Error + Send + Sync>);
        }

        let rows: Vec<Value> = response.json().await.map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Exchange response not JSON: {}", e),
            )) as Box<dyn std::error::Error + Send + Sync>
        })?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            match parse_kline_row(row) {
                Some(candle) => candles.push(candle),
                None => {
                    warn!(symbol = %symbol, "Skipping malformed kline row");
                }
            }
        }
        candles.sort_by_key(|c| c.timestamp);

        debug!(
            symbol = %symbol,
            timeframe = %timeframe,
            count = candles.len(),
            "Fetched {} candles for {}",
            candles.len(),
            symbol
        );

        Ok(candles)
    }
}

impl Default for ExchangeRestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for ExchangeRestClient {
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, Box<dyn std::error::Error + Send + Sync>> {
        // Cache-through only for "latest window" requests; historical
        // lookups with an explicit end go straight to the venue.
        let cache_key = candles_key(symbol, timeframe.as_str());
        if end_time.is_none() {
            if let Some(ref cache) = self.cache {
                match cache.get_json::<Vec<Candle>>(&cache_key).await {
                    Ok(Some(cached)) if cached.len() >= limit => {
                        return Ok(cached[cached.len() - limit..].to_vec());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Candle cache read failed, fetching from exchange");
                    }
                }
            }
        }

        // One retry on transient failure, then give up
        let fetch = || self.fetch_klines(symbol, timeframe, limit, end_time);
        let candles = fetch
            .retry(ExponentialBuilder::default().with_max_times(1))
            .await?;

        if end_time.is_none() && !candles.is_empty() {
            if let Some(ref cache) = self.cache {
                if let Err(e) = cache
                    .set_json(&cache_key, &candles, Some(CACHE_TTL_SECONDS))
                    .await
                {
                    warn!(error = %e, "Candle cache write failed");
                }
            }
        }

        Ok(candles)
    }

    async fn get_latest_price(
        &self,
        symbol: &str,
    ) -> Result<Option<f64>, Box<dyn std::error::Error + Send + Sync>> {
        let candles = self
            .get_candles(symbol, Timeframe::M1, 1, None)
            .await?;
        Ok(candles.last().map(|c| c.close))
    }
}

/// Parse one kline row: `[openTime, "open", "high", "low", "close",
/// "volume", closeTime, ...]`. Numeric fields arrive as strings.
fn parse_kline_row(row: &Value) -> Option<Candle> {
    let fields = row.as_array()?;
    if fields.len() < 6 {
        return None;
    }

    let open_time_ms = fields[0].as_i64()?;
    let timestamp = DateTime::from_timestamp_millis(open_time_ms)?;

    let number = |v: &Value| -> Option<f64> {
        match v {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    };

    let open = number(&fields[1])?;
    let high = number(&fields[2])?;
    let low = number(&fields[3])?;
    let close = number(&fields[4])?;
    let volume = number(&fields[5])?;

    let candle = Candle::new(open, high, low, close, volume, timestamp);
    if candle.is_well_formed() {
        Some(candle)
    } else {
        None
    }
}
