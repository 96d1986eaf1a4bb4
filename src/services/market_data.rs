//! Market data provider interface

use crate::models::{Candle, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Get historical candles for a symbol, oldest first. An empty or
    /// partial exchange response yields a short (possibly empty) vec,
    /// never an error.
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, Box<dyn std::error::Error + Send + Sync>>;

    /// Latest traded price for a symbol, when the venue knows it
    async fn get_latest_price(
        &self,
        symbol: &str,
    ) -> Result<Option<f64>, Box<dyn std::error::Error + Send + Sync>>;
}
