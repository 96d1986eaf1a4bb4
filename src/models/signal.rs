//! Signal data model shared by the composer, evaluator, and persistence

use crate::models::candle::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Hold => "HOLD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(SignalAction::Buy),
            "SELL" => Some(SignalAction::Sell),
            "HOLD" => Some(SignalAction::Hold),
            _ => None,
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a stored signal. Mutated exactly once, Pending → resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalOutcome {
    Pending,
    Win,
    Loss,
    Untouched,
}

impl SignalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalOutcome::Pending => "PENDING",
            SignalOutcome::Win => "WIN",
            SignalOutcome::Loss => "LOSS",
            SignalOutcome::Untouched => "UNTOUCHED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(SignalOutcome::Pending),
            "WIN" => Some(SignalOutcome::Win),
            "LOSS" => Some(SignalOutcome::Loss),
            "UNTOUCHED" => Some(SignalOutcome::Untouched),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, SignalOutcome::Pending)
    }
}

/// Explainability entry attached to a composed signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalReason {
    pub description: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub action: SignalAction,
    /// Heuristic score in [0, 100]; not a calibrated probability
    pub confidence: f64,
    pub entry_price: f64,
    pub take_profit: f64,
    pub stop_loss: f64,
    pub reasons: Vec<SignalReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    pub created_at: DateTime<Utc>,
    pub outcome: SignalOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Signal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: String,
        timeframe: Timeframe,
        action: SignalAction,
        confidence: f64,
        entry_price: f64,
        take_profit: f64,
        stop_loss: f64,
        reasons: Vec<SignalReason>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let id = dedup_id(&symbol, timeframe, entry_price, created_at);
        Self {
            id,
            symbol,
            timeframe,
            action,
            confidence: confidence.clamp(0.0, 100.0),
            entry_price,
            take_profit,
            stop_loss,
            reasons,
            narrative: None,
            created_at,
            outcome: SignalOutcome::Pending,
            actual_return: None,
            closed_at: None,
        }
    }

    /// Human-readable one-line summary of the reasons
    pub fn reasoning(&self) -> String {
        if self.reasons.is_empty() {
            return "No contributing factors".to_string();
        }
        self.reasons
            .iter()
            .map(|r| r.description.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Deterministic deduplication key: the same setup (symbol, timeframe,
/// price bucket, hour) always maps to the same id, so re-composing within
/// the hour upserts instead of re-alerting.
pub fn dedup_id(
    symbol: &str,
    timeframe: Timeframe,
    entry_price: f64,
    created_at: DateTime<Utc>,
) -> String {
    format!(
        "{}-{}-{}-{}",
        symbol,
        timeframe.as_str(),
        price_bucket(entry_price),
        created_at.format("%Y%m%d%H")
    )
}

/// Bucket a price to three significant figures so nearby entries collapse
/// into one setup.
fn price_bucket(price: f64) -> String {
    if price <= 0.0 || !price.is_finite() {
        return "0".to_string();
    }
    let magnitude = price.abs().log10().floor();
    let scale = 10f64.powf(magnitude - 2.0);
    let bucketed = (price / scale).round() * scale;
    if bucketed >= 1.0 {
        format!("{:.0}", bucketed)
    } else {
        format!("{:.6}", bucketed)
    }
}
