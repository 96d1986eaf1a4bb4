//! Sub-score calculation and confidence weighting
//!
//! Each sub-score normalizes one evidence source to [0, 1] for the chosen
//! direction. The composer blends them with `ScoreWeights` into a 0-100
//! confidence figure. The weights are heuristic configuration, not a
//! calibrated model.

use crate::indicators::IndicatorSnapshot;
use crate::models::{SignalAction, SignalReason};
use crate::smc::{Direction, SmcAnalysis};
use serde::{Deserialize, Serialize};

/// Relative weight of each evidence source. Expected to sum to 1.0; the
/// composer normalizes by the actual sum so partial overrides stay sane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub trend: f64,
    pub volume: f64,
    pub smc: f64,
    pub momentum: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            trend: 0.30,
            volume: 0.20,
            smc: 0.35,
            momentum: 0.15,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.trend + self.volume + self.smc + self.momentum
    }
}

/// EMA separation relative to price, zeroed when the EMAs point against
/// the chosen direction. Saturates at 2% separation.
pub fn trend_strength(snapshot: &IndicatorSnapshot, action: SignalAction) -> f64 {
    let (Some(fast), Some(slow)) = (snapshot.ema_fast, snapshot.ema_slow) else {
        return 0.0;
    };
    if snapshot.price <= 0.0 {
        return 0.0;
    }

    let aligned = match action {
        SignalAction::Buy => fast > slow,
        SignalAction::Sell => fast < slow,
        SignalAction::Hold => false,
    };
    if !aligned {
        return 0.0;
    }

    let separation_pct = ((fast - slow).abs() / snapshot.price) * 100.0;
    (separation_pct / 2.0).clamp(0.0, 1.0)
}

/// Volume ratio mapped linearly: at or below average volume scores 0,
/// double the average saturates at 1.
pub fn volume_confirmation(snapshot: &IndicatorSnapshot) -> f64 {
    match snapshot.volume_ratio {
        Some(ratio) => (ratio - 1.0).clamp(0.0, 1.0),
        None => 0.0,
    }
}

/// Directional SMC pattern count, saturating at four patterns
pub fn smc_score(analysis: &SmcAnalysis, action: SignalAction) -> f64 {
    let direction = match action {
        SignalAction::Buy => Direction::Bullish,
        SignalAction::Sell => Direction::Bearish,
        SignalAction::Hold => return 0.0,
    };
    (analysis.pattern_count(direction) as f64 / 4.0).clamp(0.0, 1.0)
}

/// RSI side and MACD histogram sign each contribute half when they agree
/// with the direction
pub fn momentum_agreement(snapshot: &IndicatorSnapshot, action: SignalAction) -> f64 {
    let mut score = 0.0;

    if let Some(rsi) = snapshot.rsi {
        let agrees = match action {
            SignalAction::Buy => rsi > 50.0,
            SignalAction::Sell => rsi < 50.0,
            SignalAction::Hold => false,
        };
        if agrees {
            score += 0.5;
        }
    }

    if let Some(macd) = snapshot.macd {
        let agrees = match action {
            SignalAction::Buy => macd.histogram > 0.0,
            SignalAction::Sell => macd.histogram < 0.0,
            SignalAction::Hold => false,
        };
        if agrees {
            score += 0.5;
        }
    }

    score
}

/// Blend the sub-scores into a confidence in [0, 100] plus the
/// explainability breakdown.
pub fn blend(
    snapshot: &IndicatorSnapshot,
    analysis: &SmcAnalysis,
    action: SignalAction,
    weights: &ScoreWeights,
) -> (f64, Vec<SignalReason>) {
    let total = weights.total();
    if action == SignalAction::Hold || total <= 0.0 {
        return (0.0, Vec::new());
    }

    let components = [
        ("Trend strength", trend_strength(snapshot, action), weights.trend),
        ("Volume confirmation", volume_confirmation(snapshot), weights.volume),
        ("SMC patterns", smc_score(analysis, action), weights.smc),
        ("Momentum agreement", momentum_agreement(snapshot, action), weights.momentum),
    ];

    let mut confidence = 0.0;
    let mut reasons = Vec::new();
    for (name, score, weight) in components {
        let contribution = score * weight / total;
        confidence += contribution;
        if score > 0.0 {
            reasons.push(SignalReason {
                description: format!("{}: {:.0}%", name, score * 100.0),
                weight: contribution,
            });
        }
    }

    ((confidence * 100.0).clamp(0.0, 100.0), reasons)
}
