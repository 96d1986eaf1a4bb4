//! Fair value gap detection
//!
//! A fair value gap is a three-candle displacement where the first and
//! third candles do not overlap, leaving an unfilled price void.

use crate::models::Candle;
use crate::smc::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    /// Index of the middle (displacement) candle
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
    pub direction: Direction,
}

impl FairValueGap {
    pub fn size(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Scan for fair value gaps at least `min_gap_pct` percent of price wide.
pub fn find_fair_value_gaps(candles: &[Candle], min_gap_pct: f64) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();
    if candles.len() < 3 {
        return gaps;
    }

    for i in 2..candles.len() {
        let first = &candles[i - 2];
        let third = &candles[i];
        let reference = candles[i - 1].close;
        if reference <= 0.0 {
            continue;
        }

        // Bullish: gap between the first candle's high and the third's low
        if third.low > first.high {
            let gap = third.low - first.high;
            if (gap / reference) * 100.0 >= min_gap_pct {
                gaps.push(FairValueGap {
                    index: i - 1,
                    lower: first.high,
                    upper: third.low,
                    direction: Direction::Bullish,
                });
            }
        // Bearish: gap between the first candle's low and the third's high
        } else if third.high < first.low {
            let gap = first.low - third.high;
            if (gap / reference) * 100.0 >= min_gap_pct {
                gaps.push(FairValueGap {
                    index: i - 1,
                    lower: third.high,
                    upper: first.low,
                    direction: Direction::Bearish,
                });
            }
        }
    }

    gaps
}
