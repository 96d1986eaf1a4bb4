//! Unit tests for ATR

use chrono::{Duration, Utc};
use signalis::indicators::volatility::atr::{atr_percent, calculate_atr};
use signalis::models::Candle;

fn uniform_range_candles(count: usize, range: f64) -> Vec<Candle> {
    let base = Utc::now();
    (0..count)
        .map(|i| {
            Candle::new(
                100.0,
                100.0 + range,
                100.0,
                100.0 + range / 2.0,
                1000.0,
                base + Duration::minutes(i as i64),
            )
        })
        .collect()
}

#[test]
fn atr_requires_period_plus_one_candles() {
    let candles = uniform_range_candles(14, 1.0);
    assert!(calculate_atr(&candles, 14).is_none());
}

#[test]
fn atr_of_uniform_candles_is_the_range() {
    let candles = uniform_range_candles(30, 2.0);
    let atr = calculate_atr(&candles, 14).unwrap();
    assert!((atr - 2.0).abs() < 1e-9, "got {}", atr);
}

#[test]
fn atr_percent_relates_range_to_price() {
    let candles = uniform_range_candles(30, 2.0);
    let pct = atr_percent(&candles, 14).unwrap();
    // range 2.0 on a close of 101.0
    assert!((pct - 2.0 / 101.0 * 100.0).abs() < 1e-9, "got {}", pct);
}
