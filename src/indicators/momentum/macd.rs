//! MACD (Moving Average Convergence Divergence) indicator

use crate::common::math;
use crate::models::Candle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Calculate MACD
///
/// MACD = EMA(fast) - EMA(slow)
/// Signal = EMA(signal_period) of MACD
/// Histogram = MACD - Signal
pub fn calculate_macd(
    candles: &[Candle],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<MacdValue> {
    if candles.len() < slow_period + signal_period {
        return None;
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    // Build the MACD series so the signal line can be smoothed over it
    let mut macd_values = Vec::new();
    let mut fast_ema = math::sma(&closes[..fast_period], fast_period)?;
    let mut slow_ema = math::sma(&closes[..slow_period], slow_period)?;

    for i in fast_period..closes.len() {
        fast_ema = math::ema_from_previous(closes[i], fast_ema, fast_period);
        if i >= slow_period {
            slow_ema = math::ema_from_previous(closes[i], slow_ema, slow_period);
            macd_values.push(fast_ema - slow_ema);
        }
    }

    if macd_values.len() < signal_period {
        return None;
    }

    let macd_line = *macd_values.last()?;
    let signal_line = math::ema(&macd_values, signal_period)?;

    Some(MacdValue {
        macd: macd_line,
        signal: signal_line,
        histogram: macd_line - signal_line,
    })
}

/// Calculate MACD with default periods (12, 26, 9)
pub fn calculate_macd_default(candles: &[Candle]) -> Option<MacdValue> {
    calculate_macd(candles, 12, 26, 9)
}
