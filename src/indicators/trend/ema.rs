//! EMA (Exponential Moving Average) indicator

use crate::common::math;
use crate::models::Candle;

/// Calculate EMA for a specific period
pub fn calculate_ema(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period {
        return None;
    }
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    math::ema(&closes, period)
}

/// Check for an EMA cross (fast above/below slow)
///
/// Returns 1 for bullish (fast above slow), -1 for bearish, 0 when equal
pub fn check_ema_cross(candles: &[Candle], fast_period: usize, slow_period: usize) -> Option<i32> {
    let fast = calculate_ema(candles, fast_period)?;
    let slow = calculate_ema(candles, slow_period)?;

    if fast > slow {
        Some(1)
    } else if fast < slow {
        Some(-1)
    } else {
        Some(0)
    }
}
