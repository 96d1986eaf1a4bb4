//! Threshold state and adjustment audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single shared adaptive parameter gating signal execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdState {
    pub current_threshold: f64,
    pub last_updated: DateTime<Utc>,
}

impl ThresholdState {
    pub fn new(current_threshold: f64, last_updated: DateTime<Utc>) -> Self {
        Self {
            current_threshold,
            last_updated,
        }
    }
}

/// Audit record for a single threshold change (old → new plus the evidence)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdAdjustment {
    pub old_threshold: f64,
    pub new_threshold: f64,
    pub success_rate: f64,
    pub sample_size: u32,
    pub reason: String,
    pub adjusted_at: DateTime<Utc>,
}

/// Win/loss/untouched counts over an evaluation window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub wins: u32,
    pub losses: u32,
    pub untouched: u32,
}

impl OutcomeStats {
    /// Evaluated signals that carry threshold information. UNTOUCHED is
    /// excluded from the denominator: a signal that never reached either
    /// level says nothing about whether the confidence bar was right.
    pub fn sample_size(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn success_rate(&self) -> Option<f64> {
        let n = self.sample_size();
        if n == 0 {
            None
        } else {
            Some(self.wins as f64 / n as f64)
        }
    }
}
