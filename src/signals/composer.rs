//! Signal composition: candles + indicators + SMC → directional call
//!
//! `compose` is pure over its inputs; persistence, gating, and
//! notification are separate steps owned by the caller.

use crate::indicators::{IndicatorPeriods, IndicatorSnapshot};
use crate::models::{series_is_valid, Candle, Signal, SignalAction, SignalReason, Timeframe};
use crate::signals::scoring::{self, ScoreWeights};
use crate::smc::{self, Direction, SmcAnalysis, SmcConfig};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposerConfig {
    pub periods: IndicatorPeriods,
    pub smc: SmcConfig,
    pub weights: ScoreWeights,
    /// TP distance in ATR multiples
    pub atr_tp_multiple: f64,
    /// SL distance in ATR multiples
    pub atr_sl_multiple: f64,
    /// TP distance as percent of entry when ATR is unavailable
    pub fallback_tp_pct: f64,
    /// SL distance as percent of entry when ATR is unavailable
    pub fallback_sl_pct: f64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            periods: IndicatorPeriods::default(),
            smc: SmcConfig::default(),
            weights: ScoreWeights::default(),
            atr_tp_multiple: 2.0,
            atr_sl_multiple: 1.5,
            fallback_tp_pct: 3.0,
            fallback_sl_pct: 2.0,
        }
    }
}

/// Full composition output: the signal plus the evidence it was built from
#[derive(Debug, Clone)]
pub struct Composition {
    pub signal: Signal,
    pub indicators: Option<IndicatorSnapshot>,
    pub smc: Option<SmcAnalysis>,
}

pub struct SignalComposer {
    config: ComposerConfig,
}

impl SignalComposer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Compose a signal from a candle window.
    ///
    /// Data-quality problems never raise: malformed or insufficient data
    /// degrades to a Hold signal with confidence 0 and a reason saying why.
    pub fn compose(&self, symbol: &str, timeframe: Timeframe, candles: &[Candle]) -> Composition {
        let entry_price = candles.last().map(|c| c.close).unwrap_or(0.0);

        if !series_is_valid(candles) {
            return self.degraded(symbol, timeframe, entry_price, "Malformed candle data");
        }

        let min_candles = self.config.periods.max_lookback();
        if candles.len() < min_candles {
            let reason = format!(
                "Insufficient history: {} candles, {} required",
                candles.len(),
                min_candles
            );
            return self.degraded(symbol, timeframe, entry_price, &reason);
        }

        let snapshot = match IndicatorSnapshot::compute(candles, &self.config.periods) {
            Some(s) => s,
            None => return self.degraded(symbol, timeframe, entry_price, "Empty candle window"),
        };
        let analysis = smc::analyze(candles, &self.config.smc);

        let (action, mut reasons) = self.decide_action(&snapshot, &analysis);
        let (confidence, score_reasons) =
            scoring::blend(&snapshot, &analysis, action, &self.config.weights);
        reasons.extend(score_reasons);

        let (take_profit, stop_loss) = self.levels(action, entry_price, snapshot.atr);

        let signal = Signal::new(
            symbol.to_string(),
            timeframe,
            action,
            confidence,
            entry_price,
            take_profit,
            stop_loss,
            reasons,
            Utc::now(),
        );

        Composition {
            signal,
            indicators: Some(snapshot),
            smc: Some(analysis),
        }
    }

    /// Direction rule: a structural break wins outright; otherwise the EMA
    /// cross decides; anything else is Hold.
    fn decide_action(
        &self,
        snapshot: &IndicatorSnapshot,
        analysis: &SmcAnalysis,
    ) -> (SignalAction, Vec<SignalReason>) {
        if let Some(bos) = analysis.structure_break {
            let (action, label) = match bos.direction {
                Direction::Bullish => (SignalAction::Buy, "bullish"),
                Direction::Bearish => (SignalAction::Sell, "bearish"),
            };
            let reason = SignalReason {
                description: format!(
                    "Break of structure ({}) beyond {:.4}",
                    label, bos.broken_level
                ),
                weight: 0.0,
            };
            return (action, vec![reason]);
        }

        match (snapshot.ema_fast, snapshot.ema_slow) {
            (Some(fast), Some(slow)) if fast > slow => (
                SignalAction::Buy,
                vec![SignalReason {
                    description: format!("EMA cross bullish: {:.4} above {:.4}", fast, slow),
                    weight: 0.0,
                }],
            ),
            (Some(fast), Some(slow)) if fast < slow => (
                SignalAction::Sell,
                vec![SignalReason {
                    description: format!("EMA cross bearish: {:.4} below {:.4}", fast, slow),
                    weight: 0.0,
                }],
            ),
            _ => (
                SignalAction::Hold,
                vec![SignalReason {
                    description: "No directional edge".to_string(),
                    weight: 0.0,
                }],
            ),
        }
    }

    /// TP/SL placement: ATR multiples around entry, percentage fallback
    /// when the window was too short for ATR. Hold signals carry no levels.
    fn levels(&self, action: SignalAction, entry: f64, atr: Option<f64>) -> (f64, f64) {
        let (tp_distance, sl_distance) = match atr {
            Some(atr) if atr > 0.0 => (
                atr * self.config.atr_tp_multiple,
                atr * self.config.atr_sl_multiple,
            ),
            _ => (
                entry * self.config.fallback_tp_pct / 100.0,
                entry * self.config.fallback_sl_pct / 100.0,
            ),
        };

        match action {
            SignalAction::Buy => (entry + tp_distance, entry - sl_distance),
            SignalAction::Sell => (entry - tp_distance, entry + sl_distance),
            SignalAction::Hold => (entry, entry),
        }
    }

    fn degraded(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        entry_price: f64,
        reason: &str,
    ) -> Composition {
        let signal = Signal::new(
            symbol.to_string(),
            timeframe,
            SignalAction::Hold,
            0.0,
            entry_price,
            entry_price,
            entry_price,
            vec![SignalReason {
                description: reason.to_string(),
                weight: 0.0,
            }],
            Utc::now(),
        );
        Composition {
            signal,
            indicators: None,
            smc: None,
        }
    }
}

impl Default for SignalComposer {
    fn default() -> Self {
        Self::new(ComposerConfig::default())
    }
}
