//! Unit tests for order block detection

use chrono::{Duration, Utc};
use signalis::models::Candle;
use signalis::smc::order_blocks::find_order_blocks;
use signalis::smc::Direction;

fn candle(open: f64, high: f64, low: f64, close: f64, index: usize) -> Candle {
    Candle::new(
        open,
        high,
        low,
        close,
        1000.0,
        Utc::now() + Duration::minutes(index as i64),
    )
}

#[test]
fn bearish_candle_before_an_up_impulse_is_a_bullish_block() {
    let candles = vec![
        candle(10.0, 10.25, 9.95, 10.2, 0),
        candle(10.2, 10.25, 9.95, 10.0, 1),
        candle(10.0, 10.25, 9.95, 10.2, 2),
        candle(10.2, 10.3, 9.9, 10.0, 3),  // block: last bearish candle
        candle(10.0, 12.1, 9.95, 12.0, 4), // impulse closing above block high
    ];
    let blocks = find_order_blocks(&candles, 1.5);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].index, 3);
    assert_eq!(blocks[0].direction, Direction::Bullish);
    assert_eq!(blocks[0].high, 10.3);
    assert_eq!(blocks[0].low, 9.9);
}

#[test]
fn bullish_candle_before_a_down_impulse_is_a_bearish_block() {
    let candles = vec![
        candle(10.0, 10.25, 9.95, 10.2, 0),
        candle(10.2, 10.25, 9.95, 10.0, 1),
        candle(10.0, 10.25, 9.95, 10.2, 2),
        candle(10.0, 10.3, 9.9, 10.2, 3),  // block: last bullish candle
        candle(10.2, 10.25, 7.9, 8.0, 4),  // impulse closing below block low
    ];
    let blocks = find_order_blocks(&candles, 1.5);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].index, 3);
    assert_eq!(blocks[0].direction, Direction::Bearish);
}

#[test]
fn weak_moves_produce_no_blocks() {
    let candles: Vec<Candle> = (0..10)
        .map(|i| {
            if i % 2 == 0 {
                candle(10.0, 10.25, 9.95, 10.2, i)
            } else {
                candle(10.2, 10.25, 9.95, 10.0, i)
            }
        })
        .collect();
    assert!(find_order_blocks(&candles, 1.5).is_empty());
}

#[test]
fn short_windows_produce_no_blocks() {
    let candles = vec![
        candle(10.0, 10.25, 9.95, 10.2, 0),
        candle(10.2, 10.25, 9.95, 10.0, 1),
    ];
    assert!(find_order_blocks(&candles, 1.5).is_empty());
}
