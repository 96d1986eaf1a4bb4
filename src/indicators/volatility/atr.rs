//! ATR (Average True Range) indicator

use crate::common::math;
use crate::models::Candle;

/// Calculate ATR (Average True Range)
///
/// ATR measures market volatility by averaging true range over a period
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 {
        return None;
    }

    let mut tr_values = Vec::new();
    for i in 1..candles.len() {
        let tr = math::true_range(candles[i].high, candles[i].low, candles[i - 1].close);
        tr_values.push(tr);
    }

    math::sma(&tr_values, period)
}

/// Calculate ATR with default period (14)
pub fn calculate_atr_default(candles: &[Candle]) -> Option<f64> {
    calculate_atr(candles, 14)
}

/// ATR as a percentage of the last close. Used for the volatility context
/// offset when gating signals.
pub fn atr_percent(candles: &[Candle], period: usize) -> Option<f64> {
    let atr = calculate_atr(candles, period)?;
    let close = candles.last()?.close;
    if close <= 0.0 {
        return None;
    }
    Some((atr / close) * 100.0)
}
