//! Technical indicators computed over a candle window.
//!
//! Each indicator is a free function over `&[Candle]` returning `Option`.
//! None means the window is too short, never an error.

pub mod momentum;
pub mod trend;
pub mod volatility;
pub mod volume;

use crate::models::Candle;
use momentum::macd::MacdValue;
use serde::{Deserialize, Serialize};

/// Lookback periods for the snapshot fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    pub rsi: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub atr: usize,
    pub volume: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            rsi: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ema_fast: 9,
            ema_slow: 21,
            atr: 14,
            volume: 20,
        }
    }
}

impl IndicatorPeriods {
    /// Largest lookback any indicator in the snapshot needs. Shorter
    /// windows degrade to a neutral signal upstream.
    pub fn max_lookback(&self) -> usize {
        (self.macd_slow + self.macd_signal)
            .max(self.rsi + 1)
            .max(self.ema_slow)
            .max(self.atr + 1)
            .max(self.volume + 1)
    }
}

/// Computed indicator values for one candle window. Missing values mean
/// the window was too short for that indicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_fast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_slow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_ratio: Option<f64>,
}

impl IndicatorSnapshot {
    /// Fan out every indicator over the window. Returns None only when the
    /// window is empty (no price to anchor the snapshot to).
    pub fn compute(candles: &[Candle], periods: &IndicatorPeriods) -> Option<Self> {
        let price = candles.last()?.close;
        Some(Self {
            price,
            rsi: momentum::rsi::calculate_rsi(candles, periods.rsi),
            macd: momentum::macd::calculate_macd(
                candles,
                periods.macd_fast,
                periods.macd_slow,
                periods.macd_signal,
            ),
            ema_fast: trend::ema::calculate_ema(candles, periods.ema_fast),
            ema_slow: trend::ema::calculate_ema(candles, periods.ema_slow),
            atr: volatility::atr::calculate_atr(candles, periods.atr),
            volume_ratio: volume::volume_ratio(candles, periods.volume),
        })
    }
}
