//! Order block detection
//!
//! An order block is the last opposite-colored candle before an impulsive
//! move: a bearish candle ahead of a strong rally (bullish block), or a
//! bullish candle ahead of a strong drop (bearish block).

use crate::common::math;
use crate::models::Candle;
use crate::smc::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub index: usize,
    pub low: f64,
    pub high: f64,
    pub direction: Direction,
}

/// Scan for order blocks. A move counts as impulsive when the candle body
/// is at least `impulse_factor` times the average body over the window and
/// it closes beyond the candidate block's range.
pub fn find_order_blocks(candles: &[Candle], impulse_factor: f64) -> Vec<OrderBlock> {
    let mut blocks = Vec::new();
    if candles.len() < 3 {
        return blocks;
    }

    let bodies: Vec<f64> = candles.iter().map(Candle::body).collect();
    let avg_body = match math::mean(&bodies) {
        Some(avg) if avg > 0.0 => avg,
        _ => return blocks,
    };

    for i in 0..candles.len() - 1 {
        let block = &candles[i];
        let impulse = &candles[i + 1];

        if impulse.body() < impulse_factor * avg_body {
            continue;
        }

        if block.is_bearish() && impulse.is_bullish() && impulse.close > block.high {
            blocks.push(OrderBlock {
                index: i,
                low: block.low,
                high: block.high,
                direction: Direction::Bullish,
            });
        } else if block.is_bullish() && impulse.is_bearish() && impulse.close < block.low {
            blocks.push(OrderBlock {
                index: i,
                low: block.low,
                high: block.high,
                direction: Direction::Bearish,
            });
        }
    }

    blocks
}
