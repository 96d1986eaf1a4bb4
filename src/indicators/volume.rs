//! Volume confirmation

use crate::common::math;
use crate::models::Candle;

/// Ratio of the latest candle's volume to the rolling mean volume of the
/// preceding `period` candles. Above 1.0 means the move is backed by
/// above-average participation.
pub fn volume_ratio(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 {
        return None;
    }

    let last = candles.last()?;
    let window = &candles[candles.len() - 1 - period..candles.len() - 1];
    let volumes: Vec<f64> = window.iter().map(|c| c.volume).collect();
    let mean_volume = math::mean(&volumes)?;

    if mean_volume <= 0.0 {
        return None;
    }
    Some(last.volume / mean_volume)
}
