//! Unit tests for the dynamic confidence threshold

use async_trait::async_trait;
use chrono::{Duration, Utc};
use signalis::models::{OutcomeStats, ThresholdState};
use signalis::threshold::{
    AdjustmentReport, DynamicThreshold, ExecutionContext, InMemoryThresholdStore, OutcomeSource,
    ThresholdConfig, ThresholdStore,
};
use signalis::models::Timeframe;
use std::sync::Arc;

struct StubOutcomes {
    stats: OutcomeStats,
}

#[async_trait]
impl OutcomeSource for StubOutcomes {
    async fn outcome_stats(
        &self,
        _lookback: Duration,
    ) -> Result<OutcomeStats, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.stats)
    }
}

struct FailingOutcomes;

#[async_trait]
impl OutcomeSource for FailingOutcomes {
    async fn outcome_stats(
        &self,
        _lookback: Duration,
    ) -> Result<OutcomeStats, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("database down")))
    }
}

struct SlowOutcomes {
    stats: OutcomeStats,
}

#[async_trait]
impl OutcomeSource for SlowOutcomes {
    async fn outcome_stats(
        &self,
        _lookback: Duration,
    ) -> Result<OutcomeStats, Box<dyn std::error::Error + Send + Sync>> {
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
        Ok(self.stats)
    }
}

fn engine_at(threshold: f64) -> DynamicThreshold {
    let store = Arc::new(InMemoryThresholdStore::with_state(ThresholdState::new(
        threshold,
        Utc::now(),
    )));
    DynamicThreshold::new(ThresholdConfig::default(), store)
}

fn stats(wins: u32, losses: u32) -> StubOutcomes {
    StubOutcomes {
        stats: OutcomeStats {
            wins,
            losses,
            untouched: 0,
        },
    }
}

#[tokio::test]
async fn gate_rejects_confidence_below_threshold_with_reason() {
    let engine = engine_at(70.0);
    let decision = engine
        .should_execute(65.0, &ExecutionContext::default())
        .await;
    assert!(!decision.approved);
    assert_eq!(decision.reason, "Confidence 65.0% below threshold 70.0%");
}

#[tokio::test]
async fn gate_approves_confidence_at_or_above_threshold() {
    let engine = engine_at(70.0);
    assert!(
        engine
            .should_execute(70.0, &ExecutionContext::default())
            .await
            .approved
    );
    assert!(
        engine
            .should_execute(93.0, &ExecutionContext::default())
            .await
            .approved
    );
}

#[tokio::test]
async fn gate_is_monotone_in_confidence_for_a_fixed_context() {
    let engine = engine_at(70.0);
    let context = ExecutionContext {
        volatility_pct: Some(3.0),
        timeframe: Some(Timeframe::M5),
    };

    let mut approved_seen = false;
    for confidence in [40.0, 55.0, 70.0, 75.0, 80.0, 95.0, 100.0] {
        let decision = engine.should_execute(confidence, &context).await;
        if approved_seen {
            assert!(
                decision.approved,
                "approval must not flip back off as confidence rises"
            );
        }
        approved_seen = decision.approved;
    }
    assert!(approved_seen, "highest confidence should pass the gate");
}

#[tokio::test]
async fn volatile_context_raises_the_effective_threshold() {
    let engine = engine_at(70.0);
    let calm = engine
        .should_execute(72.0, &ExecutionContext::default())
        .await;
    let volatile = engine
        .should_execute(
            72.0,
            &ExecutionContext {
                volatility_pct: Some(6.0),
                timeframe: None,
            },
        )
        .await;
    assert!(calm.approved);
    assert!(!volatile.approved);
    assert!(volatile.effective_threshold > calm.effective_threshold);
}

#[tokio::test]
async fn no_adjustment_below_minimum_sample_size() {
    let engine = engine_at(70.0);
    let report = engine.evaluate_and_adjust(&stats(4, 3)).await;
    match report {
        AdjustmentReport::InsufficientData {
            sample_size,
            required,
            threshold,
            reason,
        } => {
            assert_eq!(sample_size, 7);
            assert_eq!(required, 10);
            assert_eq!(threshold, 70.0);
            assert!(reason.contains("Insufficient data"));
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }
    assert_eq!(engine.current().await.current_threshold, 70.0);
}

#[tokio::test]
async fn untouched_outcomes_do_not_count_toward_the_sample() {
    let engine = engine_at(70.0);
    let source = StubOutcomes {
        stats: OutcomeStats {
            wins: 4,
            losses: 3,
            untouched: 20,
        },
    };
    let report = engine.evaluate_and_adjust(&source).await;
    assert!(matches!(report, AdjustmentReport::InsufficientData { .. }));
}

#[tokio::test]
async fn low_success_rate_raises_the_threshold_by_a_bounded_step() {
    // 6 wins / 9 losses = 40% vs target 70%: one bounded step up
    let engine = engine_at(70.0);
    let report = engine.evaluate_and_adjust(&stats(6, 9)).await;
    match report {
        AdjustmentReport::Adjusted(adjustment) => {
            assert_eq!(adjustment.old_threshold, 70.0);
            assert!((adjustment.new_threshold - 72.5).abs() < 1e-9);
            assert!((adjustment.success_rate - 0.4).abs() < 1e-9);
            assert_eq!(adjustment.sample_size, 15);
            assert!(adjustment.reason.contains("raising"));
        }
        other => panic!("expected Adjusted, got {:?}", other),
    }
    assert!((engine.current().await.current_threshold - 72.5).abs() < 1e-9);
}

#[tokio::test]
async fn high_success_rate_with_adequate_volume_lowers_the_threshold() {
    let engine = engine_at(70.0);
    let report = engine.evaluate_and_adjust(&stats(14, 1)).await;
    match report {
        AdjustmentReport::Adjusted(adjustment) => {
            assert!((adjustment.new_threshold - 67.5).abs() < 1e-9);
            assert!(adjustment.reason.contains("lowering"));
        }
        other => panic!("expected Adjusted, got {:?}", other),
    }
}

#[tokio::test]
async fn high_success_rate_with_thin_volume_holds_the_threshold() {
    // 12/13 evaluated is above target but below the volume bar to lower
    let engine = engine_at(70.0);
    let report = engine.evaluate_and_adjust(&stats(12, 1)).await;
    assert!(matches!(report, AdjustmentReport::Held { .. }));
    assert_eq!(engine.current().await.current_threshold, 70.0);
}

#[tokio::test]
async fn success_rate_within_tolerance_changes_nothing() {
    // 7/10 = 70% exactly on target
    let engine = engine_at(70.0);
    let report = engine.evaluate_and_adjust(&stats(7, 3)).await;
    assert!(matches!(report, AdjustmentReport::WithinTolerance { .. }));
    assert_eq!(engine.current().await.current_threshold, 70.0);
}

#[tokio::test]
async fn threshold_never_leaves_its_bounds() {
    let engine = engine_at(94.5);

    // First raise clamps to the upper bound
    let report = engine.evaluate_and_adjust(&stats(2, 13)).await;
    match report {
        AdjustmentReport::Adjusted(adjustment) => {
            assert_eq!(adjustment.new_threshold, 95.0);
        }
        other => panic!("expected Adjusted, got {:?}", other),
    }

    // Further raises hold at the bound
    let report = engine.evaluate_and_adjust(&stats(2, 13)).await;
    assert!(matches!(report, AdjustmentReport::Held { .. }));
    assert_eq!(engine.current().await.current_threshold, 95.0);

    // And the mirror at the lower bound
    let engine = engine_at(50.0);
    let report = engine.evaluate_and_adjust(&stats(19, 1)).await;
    assert!(matches!(report, AdjustmentReport::Held { .. }));
    assert_eq!(engine.current().await.current_threshold, 50.0);
}

#[tokio::test]
async fn unreadable_performance_data_skips_the_cycle() {
    let engine = engine_at(70.0);
    let report = engine.evaluate_and_adjust(&FailingOutcomes).await;
    match report {
        AdjustmentReport::Skipped { reason } => {
            assert!(reason.contains("outcome stats"));
        }
        other => panic!("expected Skipped, got {:?}", other),
    }
    assert_eq!(engine.current().await.current_threshold, 70.0);
}

#[tokio::test]
async fn adjustment_cycles_never_overlap() {
    let engine = Arc::new(engine_at(70.0));
    let slow = SlowOutcomes {
        stats: OutcomeStats {
            wins: 6,
            losses: 9,
            untouched: 0,
        },
    };
    let slow2 = SlowOutcomes {
        stats: OutcomeStats {
            wins: 6,
            losses: 9,
            untouched: 0,
        },
    };

    let (first, second) = tokio::join!(
        engine.evaluate_and_adjust(&slow),
        engine.evaluate_and_adjust(&slow2)
    );

    let already_running = |r: &AdjustmentReport| matches!(r, AdjustmentReport::AlreadyRunning);
    assert!(
        already_running(&first) ^ already_running(&second),
        "exactly one concurrent cycle must be rejected"
    );
}

#[tokio::test]
async fn empty_store_falls_back_to_the_initial_threshold() {
    let store: Arc<dyn ThresholdStore> = Arc::new(InMemoryThresholdStore::new());
    let engine = DynamicThreshold::new(ThresholdConfig::default(), store);
    assert_eq!(engine.current().await.current_threshold, 70.0);
}
