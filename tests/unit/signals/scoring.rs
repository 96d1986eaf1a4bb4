//! Unit tests for confidence scoring

use signalis::indicators::momentum::macd::MacdValue;
use signalis::indicators::IndicatorSnapshot;
use signalis::models::SignalAction;
use signalis::signals::scoring::{
    blend, momentum_agreement, smc_score, trend_strength, volume_confirmation,
};
use signalis::signals::ScoreWeights;
use signalis::smc::SmcAnalysis;

fn snapshot(price: f64) -> IndicatorSnapshot {
    IndicatorSnapshot {
        price,
        rsi: None,
        macd: None,
        ema_fast: None,
        ema_slow: None,
        atr: None,
        volume_ratio: None,
    }
}

fn empty_smc() -> SmcAnalysis {
    SmcAnalysis {
        structure_break: None,
        order_blocks: Vec::new(),
        fair_value_gaps: Vec::new(),
    }
}

#[test]
fn trend_strength_is_zero_when_emas_point_the_wrong_way() {
    let mut snap = snapshot(100.0);
    snap.ema_fast = Some(99.0);
    snap.ema_slow = Some(101.0);
    assert_eq!(trend_strength(&snap, SignalAction::Buy), 0.0);
    assert!(trend_strength(&snap, SignalAction::Sell) > 0.0);
}

#[test]
fn trend_strength_saturates_at_two_percent_separation() {
    let mut snap = snapshot(100.0);
    snap.ema_fast = Some(105.0);
    snap.ema_slow = Some(100.0);
    assert_eq!(trend_strength(&snap, SignalAction::Buy), 1.0);
}

#[test]
fn volume_confirmation_maps_ratio_linearly() {
    let mut snap = snapshot(100.0);
    snap.volume_ratio = Some(0.8);
    assert_eq!(volume_confirmation(&snap), 0.0);
    snap.volume_ratio = Some(1.5);
    assert!((volume_confirmation(&snap) - 0.5).abs() < 1e-9);
    snap.volume_ratio = Some(3.0);
    assert_eq!(volume_confirmation(&snap), 1.0);
}

#[test]
fn momentum_agreement_splits_between_rsi_and_macd() {
    let mut snap = snapshot(100.0);
    snap.rsi = Some(60.0);
    assert_eq!(momentum_agreement(&snap, SignalAction::Buy), 0.5);
    snap.macd = Some(MacdValue {
        macd: 1.0,
        signal: 0.5,
        histogram: 0.5,
    });
    assert_eq!(momentum_agreement(&snap, SignalAction::Buy), 1.0);
    assert_eq!(momentum_agreement(&snap, SignalAction::Sell), 0.0);
}

#[test]
fn hold_signals_blend_to_zero_confidence() {
    let snap = snapshot(100.0);
    let (confidence, reasons) = blend(
        &snap,
        &empty_smc(),
        SignalAction::Hold,
        &ScoreWeights::default(),
    );
    assert_eq!(confidence, 0.0);
    assert!(reasons.is_empty());
}

#[test]
fn blend_respects_the_weight_split() {
    // All weight on momentum, full momentum agreement: confidence 100
    let mut snap = snapshot(100.0);
    snap.rsi = Some(60.0);
    snap.macd = Some(MacdValue {
        macd: 1.0,
        signal: 0.5,
        histogram: 0.5,
    });
    let weights = ScoreWeights {
        trend: 0.0,
        volume: 0.0,
        smc: 0.0,
        momentum: 1.0,
    };
    let (confidence, reasons) = blend(&snap, &empty_smc(), SignalAction::Buy, &weights);
    assert!((confidence - 100.0).abs() < 1e-9);
    assert_eq!(reasons.len(), 1);
}

#[test]
fn blend_never_exceeds_one_hundred() {
    let mut snap = snapshot(100.0);
    snap.rsi = Some(80.0);
    snap.ema_fast = Some(110.0);
    snap.ema_slow = Some(100.0);
    snap.volume_ratio = Some(5.0);
    snap.macd = Some(MacdValue {
        macd: 2.0,
        signal: 1.0,
        histogram: 1.0,
    });
    let (confidence, _) = blend(
        &snap,
        &empty_smc(),
        SignalAction::Buy,
        &ScoreWeights::default(),
    );
    assert!(confidence <= 100.0);
    assert!(confidence > 0.0);
}

#[test]
fn smc_score_counts_only_matching_direction() {
    let smc = empty_smc();
    assert_eq!(smc_score(&smc, SignalAction::Buy), 0.0);
    assert_eq!(smc_score(&smc, SignalAction::Hold), 0.0);
}
