//! Unit tests for MACD

use chrono::{Duration, Utc};
use signalis::indicators::momentum::macd::{calculate_macd, calculate_macd_default};
use signalis::models::Candle;

fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    let base = Utc::now();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            Candle::new(
                close,
                close + 0.5,
                close - 0.5,
                close,
                1000.0,
                base + Duration::minutes(i as i64),
            )
        })
        .collect()
}

#[test]
fn macd_requires_slow_plus_signal_candles() {
    let candles = candles_from_closes(&[100.0; 34]);
    assert!(calculate_macd(&candles, 12, 26, 9).is_none());
}

#[test]
fn macd_is_positive_in_a_sustained_uptrend() {
    let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
    let candles = candles_from_closes(&closes);
    let macd = calculate_macd_default(&candles).unwrap();
    assert!(macd.macd > 0.0, "fast EMA should sit above slow, got {}", macd.macd);
}

#[test]
fn macd_is_negative_in_a_sustained_downtrend() {
    let closes: Vec<f64> = (0..80).map(|i| 200.0 - i as f64).collect();
    let candles = candles_from_closes(&closes);
    let macd = calculate_macd_default(&candles).unwrap();
    assert!(macd.macd < 0.0, "got {}", macd.macd);
}

#[test]
fn macd_histogram_is_macd_minus_signal() {
    let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
    let candles = candles_from_closes(&closes);
    let macd = calculate_macd_default(&candles).unwrap();
    assert!((macd.histogram - (macd.macd - macd.signal)).abs() < 1e-9);
}
