//! Smart Money Concept pattern detection over a candle window.
//!
//! Covers the structural patterns the composer feeds on: swing structure
//! with break-of-structure, order blocks, and fair value gaps.

pub mod fair_value_gaps;
pub mod order_blocks;
pub mod structure;

use crate::models::Candle;
use fair_value_gaps::FairValueGap;
use order_blocks::OrderBlock;
use serde::{Deserialize, Serialize};
use structure::StructureBreak;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

/// Detection tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmcConfig {
    /// Candles required on each side of a swing extreme
    pub swing_wing: usize,
    /// Candle body multiple (vs average body) that counts as impulsive
    pub impulse_factor: f64,
    /// Minimum fair-value-gap width as a percentage of price
    pub min_gap_pct: f64,
}

impl Default for SmcConfig {
    fn default() -> Self {
        Self {
            swing_wing: 2,
            impulse_factor: 1.5,
            min_gap_pct: 0.1,
        }
    }
}

/// Aggregated SMC view of one candle window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmcAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_break: Option<StructureBreak>,
    pub order_blocks: Vec<OrderBlock>,
    pub fair_value_gaps: Vec<FairValueGap>,
}

impl SmcAnalysis {
    pub fn pattern_count(&self, direction: Direction) -> usize {
        let bos = self
            .structure_break
            .filter(|b| b.direction == direction)
            .map(|_| 1)
            .unwrap_or(0);
        let blocks = self
            .order_blocks
            .iter()
            .filter(|b| b.direction == direction)
            .count();
        let gaps = self
            .fair_value_gaps
            .iter()
            .filter(|g| g.direction == direction)
            .count();
        bos + blocks + gaps
    }
}

/// Run every detector over the window
pub fn analyze(candles: &[Candle], config: &SmcConfig) -> SmcAnalysis {
    SmcAnalysis {
        structure_break: structure::detect_break_of_structure(candles, config.swing_wing),
        order_blocks: order_blocks::find_order_blocks(candles, config.impulse_factor),
        fair_value_gaps: fair_value_gaps::find_fair_value_gaps(candles, config.min_gap_pct),
    }
}
