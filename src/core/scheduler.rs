//! Cron-based scheduler for enqueuing pipeline jobs

use crate::jobs::types::{EvaluateOutcomesJob, FetchCandlesJob, PurgeSignalsJob};
use crate::models::Timeframe;
use apalis::prelude::*;
use apalis_redis::RedisStorage;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Daily retention cleanup at 03:00
const PURGE_CRON: &str = "0 0 3 * * *";

/// Scheduler that periodically enqueues fetch sweeps, outcome evaluation,
/// and the daily retention purge.
pub struct JobScheduler {
    fetch_storage: Arc<RedisStorage<FetchCandlesJob>>,
    evaluate_storage: Arc<RedisStorage<EvaluateOutcomesJob>>,
    purge_storage: Arc<RedisStorage<PurgeSignalsJob>>,
    symbols: Vec<String>,
    timeframes: Vec<Timeframe>,
    signal_schedule: Schedule,
    evaluate_schedule: Schedule,
    purge_schedule: Schedule,
    handles: Arc<RwLock<Vec<tokio::task::JoinHandle<()>>>>,
}

impl JobScheduler {
    pub fn new(
        fetch_storage: Arc<RedisStorage<FetchCandlesJob>>,
        evaluate_storage: Arc<RedisStorage<EvaluateOutcomesJob>>,
        purge_storage: Arc<RedisStorage<PurgeSignalsJob>>,
        symbols: Vec<String>,
        timeframes: Vec<Timeframe>,
        signal_interval_seconds: u64,
        evaluate_interval_seconds: u64,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if signal_interval_seconds == 0 || evaluate_interval_seconds == 0 {
            return Err("Scheduler disabled: interval is 0".into());
        }

        let signal_schedule = interval_schedule(signal_interval_seconds)?;
        let evaluate_schedule = interval_schedule(evaluate_interval_seconds)?;
        let purge_schedule = Schedule::from_str(PURGE_CRON).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid purge cron '{}': {}", PURGE_CRON, e),
            )) as Box<dyn std::error::Error + Send + Sync>
        })?;

        info!(
            signal_interval = signal_interval_seconds,
            evaluate_interval = evaluate_interval_seconds,
            symbols = ?symbols,
            "JobScheduler: created (signals every {}s, evaluation every {}s)",
            signal_interval_seconds,
            evaluate_interval_seconds
        );

        Ok(Self {
            fetch_storage,
            evaluate_storage,
            purge_storage,
            symbols,
            timeframes,
            signal_schedule,
            evaluate_schedule,
            purge_schedule,
            handles: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Start all scheduler loops
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut handles = self.handles.write().await;

        // Signal sweep: one FetchCandlesJob per symbol/timeframe pair
        let storage = self.fetch_storage.clone();
        let symbols = self.symbols.clone();
        let timeframes = self.timeframes.clone();
        let schedule = self.signal_schedule.clone();
        handles.push(tokio::spawn(async move {
            loop {
                sleep_until_next_tick(&schedule).await;
                info!(
                    symbol_count = symbols.len(),
                    "JobScheduler: tick, enqueuing fetch jobs for {} symbols",
                    symbols.len()
                );
                for symbol in &symbols {
                    for timeframe in &timeframes {
                        let job = FetchCandlesJob {
                            symbol: symbol.clone(),
                            timeframe: *timeframe,
                        };
                        let mut storage_clone = (*storage).clone();
                        match storage_clone.push(job).await {
                            Ok(_) => {
                                debug!(symbol = %symbol, timeframe = %timeframe, "JobScheduler: enqueued FetchCandlesJob for {}", symbol);
                            }
                            Err(e) => {
                                error!(symbol = %symbol, error = %e, "JobScheduler: failed to enqueue FetchCandlesJob for {}", symbol);
                            }
                        }
                    }
                }
            }
        }));

        // Outcome evaluation sweep
        let storage = self.evaluate_storage.clone();
        let schedule = self.evaluate_schedule.clone();
        handles.push(tokio::spawn(async move {
            loop {
                sleep_until_next_tick(&schedule).await;
                let mut storage_clone = (*storage).clone();
                match storage_clone.push(EvaluateOutcomesJob {}).await {
                    Ok(_) => debug!("JobScheduler: enqueued EvaluateOutcomesJob"),
                    Err(e) => {
                        error!(error = %e, "JobScheduler: failed to enqueue EvaluateOutcomesJob")
                    }
                }
            }
        }));

        // Daily retention purge
        let storage = self.purge_storage.clone();
        let schedule = self.purge_schedule.clone();
        handles.push(tokio::spawn(async move {
            loop {
                sleep_until_next_tick(&schedule).await;
                let mut storage_clone = (*storage).clone();
                match storage_clone.push(PurgeSignalsJob {}).await {
                    Ok(_) => debug!("JobScheduler: enqueued PurgeSignalsJob"),
                    Err(e) => {
                        error!(error = %e, "JobScheduler: failed to enqueue PurgeSignalsJob")
                    }
                }
            }
        }));

        info!("JobScheduler: started successfully");
        Ok(())
    }

    /// Stop all scheduler loops
    pub async fn stop(&self) {
        let mut handles = self.handles.write().await;
        for handle in handles.drain(..) {
            handle.abort();
        }
        info!("JobScheduler: stopped");
    }

    pub async fn is_running(&self) -> bool {
        let handles = self.handles.read().await;
        !handles.is_empty()
    }
}

/// Convert an interval to a cron expression
/// Cron format: second minute hour day month weekday
fn interval_schedule(
    interval_seconds: u64,
) -> Result<Schedule, Box<dyn std::error::Error + Send + Sync>> {
    let cron_expr = if interval_seconds >= 60 {
        let minutes = interval_seconds / 60;
        format!("0 */{} * * * *", minutes)
    } else {
        format!("*/{} * * * * *", interval_seconds)
    };

    Schedule::from_str(&cron_expr).map_err(|e| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid cron expression '{}': {}", cron_expr, e),
        )) as Box<dyn std::error::Error + Send + Sync>
    })
}

async fn sleep_until_next_tick(schedule: &Schedule) {
    let mut upcoming = schedule.upcoming(chrono::Utc);
    if let Some(next_tick) = upcoming.next() {
        let now = chrono::Utc::now();
        if next_tick > now {
            let duration = (next_tick - now).to_std().unwrap_or_default();
            tokio::time::sleep(duration).await;
        }
    } else {
        tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
    }
}
