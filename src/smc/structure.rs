//! Market structure: swing points and break-of-structure detection

use crate::models::Candle;
use crate::smc::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

/// A confirmed local extreme. A swing needs `wing` lower highs (or higher
/// lows) on both sides, so the last `wing` candles can never confirm one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub kind: SwingKind,
}

pub fn find_swing_points(candles: &[Candle], wing: usize) -> Vec<SwingPoint> {
    let mut swings = Vec::new();
    if wing == 0 || candles.len() < 2 * wing + 1 {
        return swings;
    }

    for i in wing..candles.len() - wing {
        let is_swing_high = (1..=wing)
            .all(|o| candles[i].high > candles[i - o].high && candles[i].high > candles[i + o].high);
        if is_swing_high {
            swings.push(SwingPoint {
                index: i,
                price: candles[i].high,
                kind: SwingKind::High,
            });
            continue;
        }

        let is_swing_low = (1..=wing)
            .all(|o| candles[i].low < candles[i - o].low && candles[i].low < candles[i + o].low);
        if is_swing_low {
            swings.push(SwingPoint {
                index: i,
                price: candles[i].low,
                kind: SwingKind::Low,
            });
        }
    }

    swings
}

/// A close beyond a prior swing extreme, read as trend continuation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureBreak {
    pub direction: Direction,
    pub broken_level: f64,
}

/// Detect a break of structure: the latest close exceeding the most recent
/// confirmed swing high (bullish) or undercutting the most recent swing
/// low (bearish). If the last close somehow clears both, the side with the
/// deeper penetration wins.
pub fn detect_break_of_structure(candles: &[Candle], wing: usize) -> Option<StructureBreak> {
    let last_close = candles.last()?.close;
    let swings = find_swing_points(candles, wing);

    let last_high = swings
        .iter()
        .rev()
        .find(|s| s.kind == SwingKind::High)
        .map(|s| s.price);
    let last_low = swings
        .iter()
        .rev()
        .find(|s| s.kind == SwingKind::Low)
        .map(|s| s.price);

    let bullish = last_high.filter(|&h| last_close > h).map(|h| StructureBreak {
        direction: Direction::Bullish,
        broken_level: h,
    });
    let bearish = last_low.filter(|&l| last_close < l).map(|l| StructureBreak {
        direction: Direction::Bearish,
        broken_level: l,
    });

    match (bullish, bearish) {
        (Some(b), Some(s)) => {
            let up = last_close - b.broken_level;
            let down = s.broken_level - last_close;
            if up >= down {
                Some(b)
            } else {
                Some(s)
            }
        }
        (Some(b), None) => Some(b),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}
