//! Signalis Worker
//!
//! Processes signal pipeline jobs from the Redis queue and schedules the
//! periodic sweeps. Can run as a separate process/instance from the API
//! server.

use apalis_redis::RedisStorage;
use dotenvy::dotenv;
use signalis::cache::RedisCache;
use signalis::config;
use signalis::core::runtime::SignalRuntime;
use signalis::core::scheduler::JobScheduler;
use signalis::db::SignalDatabase;
use signalis::jobs::context::JobContext;
use signalis::jobs::types::{
    ComposeSignalJob, EvaluateOutcomesJob, FetchCandlesJob, PurgeSignalsJob, StoreSignalJob,
};
use signalis::logging;
use signalis::metrics::Metrics;
use signalis::models::Timeframe;
use signalis::services::market_data::MarketDataProvider;
use signalis::services::{ExchangeRestClient, NarrativeClient, TelegramNotifier};
use signalis::signals::{ComposerConfig, SignalComposer};
use signalis::threshold::{DynamicThreshold, RedisThresholdStore, ThresholdStore};
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let signal_interval: u64 = env::var("SIGNAL_INTERVAL_SECONDS")
        .ok()
        .and_then(|i| i.parse().ok())
        .unwrap_or(300);
    let evaluate_interval: u64 = env::var("EVALUATION_INTERVAL_SECONDS")
        .ok()
        .and_then(|i| i.parse().ok())
        .unwrap_or(600);

    let environment = config::get_environment();
    info!("Starting Signalis Worker");
    info!(environment = %environment, "Environment");

    if signal_interval == 0 || evaluate_interval == 0 {
        return Err("SIGNAL_INTERVAL_SECONDS and EVALUATION_INTERVAL_SECONDS must be > 0".into());
    }

    // Symbols and timeframes the sweeps cover
    let symbols: Vec<String> = env::var("SYMBOLS")
        .unwrap_or_else(|_| "BTCUSDT".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let timeframes: Vec<Timeframe> = env::var("TIMEFRAMES")
        .unwrap_or_else(|_| "1h".to_string())
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if symbols.is_empty() || timeframes.is_empty() {
        return Err("SYMBOLS and TIMEFRAMES must name at least one entry each".into());
    }
    info!(symbols = ?symbols, timeframes = ?timeframes, "Sweep coverage");

    let metrics = Arc::new(Metrics::new()?);

    // Postgres is required: outcome evaluation and the threshold feedback
    // loop are the worker's whole job.
    info!("Initializing Postgres connection...");
    let database = match SignalDatabase::new().await {
        Ok(db) => {
            info!("Postgres connected");
            metrics.database_connected.set(1.0);
            Arc::new(db)
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to Postgres");
            return Err(format!("Postgres connection required for worker: {}", e).into());
        }
    };

    // Redis is required: it backs the job queue and the threshold state
    info!("Initializing Redis connection...");
    let cache = match RedisCache::new().await {
        Ok(c) => {
            info!("Redis connected");
            metrics.cache_connected.set(1.0);
            Arc::new(c)
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to Redis");
            return Err(format!("Redis connection required for worker: {}", e).into());
        }
    };

    let provider: Arc<dyn MarketDataProvider> =
        Arc::new(ExchangeRestClient::new().with_cache(cache.clone()));

    let store: Arc<dyn ThresholdStore> = Arc::new(RedisThresholdStore::new(cache.clone()));
    let threshold = Arc::new(DynamicThreshold::new(config::threshold_config(), store));

    let composer_config = ComposerConfig {
        weights: config::score_weights(),
        ..ComposerConfig::default()
    };

    info!("Initializing Apalis Redis storage...");
    let redis_url = config::get_redis_url();
    let conn = apalis_redis::connect(redis_url.clone()).await?;
    let fetch_storage: Arc<RedisStorage<FetchCandlesJob>> =
        Arc::new(RedisStorage::new(conn.clone()));
    let compose_storage: Arc<RedisStorage<ComposeSignalJob>> =
        Arc::new(RedisStorage::new(conn.clone()));
    let store_storage: Arc<RedisStorage<StoreSignalJob>> =
        Arc::new(RedisStorage::new(conn.clone()));
    let evaluate_storage: Arc<RedisStorage<EvaluateOutcomesJob>> =
        Arc::new(RedisStorage::new(conn.clone()));
    let purge_storage: Arc<RedisStorage<PurgeSignalsJob>> = Arc::new(RedisStorage::new(conn));
    info!("Apalis Redis storage initialized");

    let job_context = Arc::new(JobContext {
        provider,
        database: Some(database),
        composer: Arc::new(SignalComposer::new(composer_config)),
        threshold,
        narrative: Arc::new(NarrativeClient::new(config::get_narrative_api_key())),
        notifier: Arc::new(TelegramNotifier::new(
            config::get_telegram_bot_token(),
            config::get_telegram_chat_id(),
        )),
        metrics: Some(metrics.clone()),
    });

    info!("Starting Apalis workers...");
    let runtime = SignalRuntime::new(
        job_context,
        fetch_storage.clone(),
        compose_storage.clone(),
        store_storage.clone(),
        evaluate_storage.clone(),
        purge_storage.clone(),
    );
    let worker_handles = runtime
        .start_workers()
        .await
        .map_err(|e| format!("Failed to start workers: {}", e))?;

    info!("Starting job scheduler...");
    let scheduler = JobScheduler::new(
        fetch_storage,
        evaluate_storage,
        purge_storage,
        symbols,
        timeframes,
        signal_interval,
        evaluate_interval,
    )
    .map_err(|e| format!("Failed to create scheduler: {}", e))?;
    scheduler
        .start()
        .await
        .map_err(|e| format!("Failed to start scheduler: {}", e))?;

    info!("Worker started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down worker...");
            scheduler.stop().await;
            for handle in worker_handles {
                handle.abort();
            }
            info!("Worker stopped");
        }
    }

    Ok(())
}
