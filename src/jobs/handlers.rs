//! Job handlers for the signal pipeline
//!
//! Workflow: FetchCandlesJob → ComposeSignalJob → StoreSignalJob, plus the
//! scheduler-driven EvaluateOutcomesJob and PurgeSignalsJob.

use crate::config;
use crate::evaluator;
use crate::jobs::context::JobContext;
use crate::jobs::types::{
    ComposeSignalJob, EvaluateOutcomesJob, FetchCandlesJob, PurgeSignalsJob, StoreSignalJob,
};
use crate::models::{SignalAction, SignalOutcome};
use crate::threshold::{AdjustmentReport, ExecutionContext};
use apalis::prelude::*;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const CANDLE_FETCH_LIMIT: usize = 250;
const EVALUATION_CANDLE_CAP: usize = 1000;
/// Pending signals older than this are abandoned rather than evaluated
const PENDING_MAX_AGE_DAYS: i64 = 7;

/// Fetch the candle window for a symbol and hand it to the composer
pub async fn handle_fetch_candles(
    job: FetchCandlesJob,
    ctx: Data<Arc<JobContext>>,
    compose_storage: Data<apalis_redis::RedisStorage<ComposeSignalJob>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    debug!(symbol = %job.symbol, timeframe = %job.timeframe, "FetchCandlesJob: fetching candles for {}", job.symbol);

    let candles = ctx
        .provider
        .get_candles(&job.symbol, job.timeframe, CANDLE_FETCH_LIMIT, None)
        .await
        .map_err(|e| {
            Box::new(std::io::Error::other(format!("Market data error: {}", e)))
                as Box<dyn std::error::Error + Send + Sync>
        })?;

    if candles.is_empty() {
        debug!(symbol = %job.symbol, "FetchCandlesJob: no candles available yet for {}", job.symbol);
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("No candles available for {}", job.symbol),
        )) as Box<dyn std::error::Error + Send + Sync>);
    }

    debug!(
        symbol = %job.symbol,
        count = candles.len(),
        "FetchCandlesJob: fetched {} candles for {}",
        candles.len(),
        job.symbol
    );

    let next_job = ComposeSignalJob {
        symbol: job.symbol.clone(),
        timeframe: job.timeframe,
        candles,
    };
    let mut storage = (*compose_storage).clone();
    storage.push(next_job).await.map_err(|e| {
        Box::new(std::io::Error::other(format!(
            "Failed to enqueue ComposeSignalJob: {}",
            e
        ))) as Box<dyn std::error::Error + Send + Sync>
    })?;

    Ok(())
}

/// Compose a signal from the window and gate it against the threshold
pub async fn handle_compose_signal(
    job: ComposeSignalJob,
    ctx: Data<Arc<JobContext>>,
    store_storage: Data<apalis_redis::RedisStorage<StoreSignalJob>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let composition = ctx.composer.compose(&job.symbol, job.timeframe, &job.candles);
    if let Some(ref metrics) = ctx.metrics {
        metrics.signal_compositions_total.inc();
    }

    let volatility_pct = composition.indicators.as_ref().and_then(|snapshot| {
        snapshot
            .atr
            .filter(|_| snapshot.price > 0.0)
            .map(|atr| (atr / snapshot.price) * 100.0)
    });
    let context = ExecutionContext {
        volatility_pct,
        timeframe: Some(job.timeframe),
    };
    let decision = ctx
        .threshold
        .should_execute(composition.signal.confidence, &context)
        .await;

    let actionable = decision.approved && composition.signal.action != SignalAction::Hold;
    let mut signal = composition.signal;

    if actionable {
        info!(
            symbol = %job.symbol,
            action = %signal.action,
            confidence = signal.confidence,
            "ComposeSignalJob: actionable {} signal for {} (confidence {:.1})",
            signal.action,
            job.symbol,
            signal.confidence
        );
        if let Some(ref metrics) = ctx.metrics {
            metrics.signals_actionable_total.inc();
        }
        if let Some(narrative) = ctx
            .narrative
            .generate(&signal, composition.indicators.as_ref())
            .await
        {
            signal.narrative = Some(narrative);
        }
    } else {
        debug!(
            symbol = %job.symbol,
            action = %signal.action,
            confidence = signal.confidence,
            reason = %decision.reason,
            "ComposeSignalJob: signal for {} not actionable ({})",
            job.symbol,
            decision.reason
        );
    }

    let next_job = StoreSignalJob { signal, actionable };
    let mut storage = (*store_storage).clone();
    storage.push(next_job).await.map_err(|e| {
        Box::new(std::io::Error::other(format!(
            "Failed to enqueue StoreSignalJob: {}",
            e
        ))) as Box<dyn std::error::Error + Send + Sync>
    })?;

    Ok(())
}

/// Persist a composed signal, then notify when actionable
pub async fn handle_store_signal(
    job: StoreSignalJob,
    ctx: Data<Arc<JobContext>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(ref db) = ctx.database {
        if let Err(e) = db.store_signal(&job.signal).await {
            error!(
                signal_id = %job.signal.id,
                error = %e,
                "StoreSignalJob: failed to store signal {}",
                job.signal.id
            );
            // Notification still goes out: storage failure is separate
        } else {
            debug!(signal_id = %job.signal.id, "StoreSignalJob: stored signal {}", job.signal.id);
        }
    }

    if job.actionable && ctx.notifier.is_enabled() {
        let sent = ctx.notifier.send_signal_alert(&job.signal).await;
        if !sent {
            warn!(signal_id = %job.signal.id, "StoreSignalJob: alert delivery failed for {}", job.signal.id);
        }
    }

    Ok(())
}

/// Resolve pending outcomes from later price history, then run one
/// threshold adjustment cycle over the refreshed stats.
pub async fn handle_evaluate_outcomes(
    _job: EvaluateOutcomesJob,
    ctx: Data<Arc<JobContext>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(ref db) = ctx.database else {
        debug!("EvaluateOutcomesJob: no database available, skipping");
        return Ok(());
    };

    let horizon = Duration::hours(config::evaluation_horizon_hours());
    let pending = db
        .get_pending_signals(Duration::days(PENDING_MAX_AGE_DAYS))
        .await
        .map_err(|e| {
            Box::new(std::io::Error::other(format!(
                "Failed to load pending signals: {}",
                e
            ))) as Box<dyn std::error::Error + Send + Sync>
        })?;

    debug!(
        pending = pending.len(),
        "EvaluateOutcomesJob: {} pending signals to evaluate",
        pending.len()
    );

    let mut resolved = 0;
    for signal in &pending {
        let elapsed = Utc::now() - signal.created_at;
        let tf_duration = signal.timeframe.duration();
        let needed = (elapsed.num_seconds() / tf_duration.num_seconds().max(1)) + 2;
        let limit = (needed.max(10) as usize).min(EVALUATION_CANDLE_CAP);

        let candles = match ctx
            .provider
            .get_candles(&signal.symbol, signal.timeframe, limit, None)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(
                    signal_id = %signal.id,
                    error = %e,
                    "EvaluateOutcomesJob: candle fetch failed for {}, skipping",
                    signal.id
                );
                continue;
            }
        };

        let resolution = evaluator::evaluate(signal, &candles, horizon);
        if resolution.outcome == SignalOutcome::Pending {
            continue;
        }

        match db
            .resolve_outcome(
                &signal.id,
                resolution.outcome,
                resolution.actual_return,
                resolution.closed_at,
            )
            .await
        {
            Ok(true) => {
                resolved += 1;
                info!(
                    signal_id = %signal.id,
                    outcome = resolution.outcome.as_str(),
                    actual_return = ?resolution.actual_return,
                    "EvaluateOutcomesJob: {} resolved as {}",
                    signal.id,
                    resolution.outcome.as_str()
                );
                if let Some(ref metrics) = ctx.metrics {
                    match resolution.outcome {
                        SignalOutcome::Win => metrics.outcomes_win_total.inc(),
                        SignalOutcome::Loss => metrics.outcomes_loss_total.inc(),
                        SignalOutcome::Untouched => metrics.outcomes_untouched_total.inc(),
                        SignalOutcome::Pending => {}
                    }
                }
            }
            Ok(false) => {
                debug!(signal_id = %signal.id, "EvaluateOutcomesJob: {} already resolved", signal.id);
            }
            Err(e) => {
                error!(
                    signal_id = %signal.id,
                    error = %e,
                    "EvaluateOutcomesJob: failed to persist outcome for {}",
                    signal.id
                );
            }
        }
    }

    info!(
        evaluated = pending.len(),
        resolved = resolved,
        "EvaluateOutcomesJob: resolved {}/{} pending signals",
        resolved,
        pending.len()
    );

    // Feed the refreshed outcomes back into the threshold
    let report = ctx.threshold.evaluate_and_adjust(db.as_ref()).await;
    match &report {
        AdjustmentReport::Adjusted(adjustment) => {
            if let Err(e) = db.record_adjustment(adjustment).await {
                error!(error = %e, "EvaluateOutcomesJob: failed to record adjustment");
            }
            if let Err(e) = db.prune_adjustments(config::adjustment_history_size()).await {
                warn!(error = %e, "EvaluateOutcomesJob: failed to prune adjustment history");
            }
            if let Some(ref metrics) = ctx.metrics {
                metrics.current_threshold.set(adjustment.new_threshold);
            }
        }
        AdjustmentReport::AlreadyRunning => {
            warn!("EvaluateOutcomesJob: adjustment cycle already running, skipped");
        }
        other => {
            debug!(report = ?other, "EvaluateOutcomesJob: no adjustment this cycle");
        }
    }

    Ok(())
}

/// Retention cleanup: drop resolved signals past the retention window
pub async fn handle_purge_signals(
    _job: PurgeSignalsJob,
    ctx: Data<Arc<JobContext>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(ref db) = ctx.database else {
        debug!("PurgeSignalsJob: no database available, skipping");
        return Ok(());
    };

    let retention = Duration::days(config::signal_retention_days());
    let purged = db.purge_resolved_older_than(retention).await.map_err(|e| {
        Box::new(std::io::Error::other(format!(
            "Failed to purge signals: {}",
            e
        ))) as Box<dyn std::error::Error + Send + Sync>
    })?;

    info!(purged = purged, "PurgeSignalsJob: purged {} resolved signals", purged);
    Ok(())
}
