//! Job types for the signal pipeline

use crate::models::{Candle, Signal, Timeframe};
use serde::{Deserialize, Serialize};

/// Fetch the candle window for one symbol/timeframe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchCandlesJob {
    pub symbol: String,
    pub timeframe: Timeframe,
}

/// Compose and gate a signal from a fetched window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeSignalJob {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
}

/// Persist a composed signal and notify when actionable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSignalJob {
    pub signal: Signal,
    pub actionable: bool,
}

/// Resolve pending signal outcomes and run one threshold adjustment cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateOutcomesJob {}

/// Retention cleanup of resolved signals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeSignalsJob {}
