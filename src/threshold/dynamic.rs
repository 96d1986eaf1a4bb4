//! Dynamic confidence threshold: gate + periodic feedback adjustment

use crate::models::{OutcomeStats, ThresholdAdjustment, ThresholdState, Timeframe};
use crate::threshold::store::ThresholdStore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Threshold used until the first adjustment lands
    pub initial_threshold: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    /// Desired win rate over WIN/LOSS outcomes
    pub target_success_rate: f64,
    /// Deviation from target tolerated without adjusting
    pub tolerance: f64,
    /// Base adjustment step; a single adjustment never exceeds 2x this
    pub step: f64,
    /// Evaluated signals required before any adjustment
    pub min_sample_size: u32,
    /// Evaluated signals required before lowering the bar
    pub min_volume_to_lower: u32,
    /// Outcome lookback window in hours
    pub lookback_hours: i64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 70.0,
            min_threshold: 50.0,
            max_threshold: 95.0,
            target_success_rate: 0.70,
            tolerance: 0.05,
            step: 1.25,
            min_sample_size: 10,
            min_volume_to_lower: 15,
            lookback_hours: 24,
        }
    }
}

/// Context the gate may nudge the effective threshold with. Offsets are
/// small and bounded so confidence monotonicity is preserved for a fixed
/// context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// ATR as a percentage of price, when known
    pub volatility_pct: Option<f64>,
    pub timeframe: Option<Timeframe>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub approved: bool,
    pub confidence: f64,
    pub effective_threshold: f64,
    pub reason: String,
}

/// Result of one adjustment cycle
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AdjustmentReport {
    Adjusted(ThresholdAdjustment),
    WithinTolerance {
        success_rate: f64,
        sample_size: u32,
        threshold: f64,
    },
    InsufficientData {
        sample_size: u32,
        required: u32,
        threshold: f64,
        reason: String,
    },
    Held {
        threshold: f64,
        reason: String,
    },
    /// Performance data could not be read; previous threshold kept
    Skipped {
        reason: String,
    },
    AlreadyRunning,
}

/// Source of recent win/loss outcomes for the adjuster
#[async_trait]
pub trait OutcomeSource: Send + Sync {
    async fn outcome_stats(
        &self,
        lookback: Duration,
    ) -> Result<OutcomeStats, Box<dyn std::error::Error + Send + Sync>>;
}

pub struct DynamicThreshold {
    config: ThresholdConfig,
    store: Arc<dyn ThresholdStore>,
    adjust_lock: Mutex<()>,
}

impl DynamicThreshold {
    pub fn new(config: ThresholdConfig, store: Arc<dyn ThresholdStore>) -> Self {
        Self {
            config,
            store,
            adjust_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Current state, falling back to the configured initial threshold
    /// when the store is empty or unreadable (fail-safe: gating keeps
    /// working without persistence).
    pub async fn current(&self) -> ThresholdState {
        match self.store.get().await {
            Ok(Some(state)) => ThresholdState::new(
                state
                    .current_threshold
                    .clamp(self.config.min_threshold, self.config.max_threshold),
                state.last_updated,
            ),
            Ok(None) => ThresholdState::new(self.config.initial_threshold, Utc::now()),
            Err(e) => {
                warn!(error = %e, "Threshold store unreadable, using initial threshold");
                ThresholdState::new(self.config.initial_threshold, Utc::now())
            }
        }
    }

    /// Gate a composed signal's confidence against the current threshold
    /// plus a bounded contextual offset.
    pub async fn should_execute(&self, confidence: f64, context: &ExecutionContext) -> Decision {
        let state = self.current().await;
        let offset = context_offset(context);
        let effective = (state.current_threshold + offset)
            .clamp(self.config.min_threshold, self.config.max_threshold);

        if confidence >= effective {
            Decision {
                approved: true,
                confidence,
                effective_threshold: effective,
                reason: format!(
                    "Confidence {:.1}% meets threshold {:.1}%",
                    confidence, effective
                ),
            }
        } else {
            Decision {
                approved: false,
                confidence,
                effective_threshold: effective,
                reason: format!(
                    "Confidence {:.1}% below threshold {:.1}%",
                    confidence, effective
                ),
            }
        }
    }

    /// Pull recent outcomes and move the threshold toward the target
    /// success rate. Single-flight: an overlapping call returns
    /// `AlreadyRunning` without touching state. Any error reading
    /// performance data keeps the previous threshold.
    pub async fn evaluate_and_adjust(&self, source: &dyn OutcomeSource) -> AdjustmentReport {
        let _guard = match self.adjust_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => return AdjustmentReport::AlreadyRunning,
        };

        let state = self.current().await;
        let expected = match self.store.get().await {
            Ok(stored) => stored.map(|s| s.current_threshold),
            Err(e) => {
                return AdjustmentReport::Skipped {
                    reason: format!("Threshold store unreadable: {}", e),
                }
            }
        };

        let lookback = Duration::hours(self.config.lookback_hours);
        let stats = match source.outcome_stats(lookback).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Failed to read outcome stats, keeping threshold");
                return AdjustmentReport::Skipped {
                    reason: format!("Failed to read outcome stats: {}", e),
                };
            }
        };

        let sample_size = stats.sample_size();
        if sample_size < self.config.min_sample_size {
            return AdjustmentReport::InsufficientData {
                sample_size,
                required: self.config.min_sample_size,
                threshold: state.current_threshold,
                reason: format!(
                    "Insufficient data: {} evaluated signals, {} required",
                    sample_size, self.config.min_sample_size
                ),
            };
        }

        // sample_size > 0 is guaranteed past the minimum-sample check
        let success_rate = stats.success_rate().unwrap_or(0.0);
        let deviation = success_rate - self.config.target_success_rate;

        if deviation.abs() <= self.config.tolerance {
            return AdjustmentReport::WithinTolerance {
                success_rate,
                sample_size,
                threshold: state.current_threshold,
            };
        }

        let raising = deviation < 0.0;
        if !raising && sample_size < self.config.min_volume_to_lower {
            return AdjustmentReport::Held {
                threshold: state.current_threshold,
                reason: format!(
                    "Success rate {:.1}% above target but only {} evaluated signals, {} required to lower",
                    success_rate * 100.0,
                    sample_size,
                    self.config.min_volume_to_lower
                ),
            };
        }

        // Step proportional to the deviation, never more than 2x the base
        let scaled = self.config.step * (deviation.abs() / self.config.tolerance);
        let step_amount = scaled.min(self.config.step * 2.0);
        let proposed = if raising {
            state.current_threshold + step_amount
        } else {
            state.current_threshold - step_amount
        };
        let new_threshold = proposed.clamp(self.config.min_threshold, self.config.max_threshold);

        if (new_threshold - state.current_threshold).abs() < f64::EPSILON {
            return AdjustmentReport::Held {
                threshold: state.current_threshold,
                reason: format!(
                    "Threshold already at {} bound",
                    if raising { "upper" } else { "lower" }
                ),
            };
        }

        let reason = format!(
            "Success rate {:.1}% {} target {:.1}%: {} threshold",
            success_rate * 100.0,
            if raising { "below" } else { "above" },
            self.config.target_success_rate * 100.0,
            if raising { "raising" } else { "lowering" }
        );

        let new_state = ThresholdState::new(new_threshold, Utc::now());
        match self.store.compare_and_set(expected, new_state).await {
            Ok(true) => {
                info!(
                    old = state.current_threshold,
                    new = new_threshold,
                    success_rate = success_rate,
                    sample_size = sample_size,
                    "Threshold adjusted {:.2} -> {:.2} ({})",
                    state.current_threshold,
                    new_threshold,
                    reason
                );
                AdjustmentReport::Adjusted(ThresholdAdjustment {
                    old_threshold: state.current_threshold,
                    new_threshold,
                    success_rate,
                    sample_size,
                    reason,
                    adjusted_at: new_state.last_updated,
                })
            }
            Ok(false) => AdjustmentReport::Skipped {
                reason: "Concurrent threshold update detected, keeping stored value".to_string(),
            },
            Err(e) => {
                warn!(error = %e, "Failed to persist threshold, keeping previous value");
                AdjustmentReport::Skipped {
                    reason: format!("Failed to persist threshold: {}", e),
                }
            }
        }
    }
}

/// Bounded offset from execution context: volatile markets and noisy
/// timeframes demand a higher bar, slow timeframes a slightly lower one.
fn context_offset(context: &ExecutionContext) -> f64 {
    let mut offset = 0.0;

    if let Some(volatility) = context.volatility_pct {
        if volatility > 5.0 {
            offset += 5.0;
        } else if volatility > 2.5 {
            offset += 2.5;
        }
    }

    match context.timeframe {
        Some(Timeframe::M1) | Some(Timeframe::M5) => offset += 2.5,
        Some(Timeframe::H4) | Some(Timeframe::D1) => offset -= 2.5,
        _ => {}
    }

    offset
}
