//! Apalis worker setup for the signal pipeline

use crate::jobs::context::JobContext;
use crate::jobs::handlers;
use crate::jobs::types::{
    ComposeSignalJob, EvaluateOutcomesJob, FetchCandlesJob, PurgeSignalsJob, StoreSignalJob,
};
use apalis::prelude::*;
use apalis_redis::RedisStorage;
use std::sync::Arc;
use tracing::info;

/// Signal runtime that sets up one Apalis worker per job type
pub struct SignalRuntime {
    job_context: Arc<JobContext>,
    fetch_storage: Arc<RedisStorage<FetchCandlesJob>>,
    compose_storage: Arc<RedisStorage<ComposeSignalJob>>,
    store_storage: Arc<RedisStorage<StoreSignalJob>>,
    evaluate_storage: Arc<RedisStorage<EvaluateOutcomesJob>>,
    purge_storage: Arc<RedisStorage<PurgeSignalsJob>>,
}

impl SignalRuntime {
    pub fn new(
        job_context: Arc<JobContext>,
        fetch_storage: Arc<RedisStorage<FetchCandlesJob>>,
        compose_storage: Arc<RedisStorage<ComposeSignalJob>>,
        store_storage: Arc<RedisStorage<StoreSignalJob>>,
        evaluate_storage: Arc<RedisStorage<EvaluateOutcomesJob>>,
        purge_storage: Arc<RedisStorage<PurgeSignalsJob>>,
    ) -> Self {
        Self {
            job_context,
            fetch_storage,
            compose_storage,
            store_storage,
            evaluate_storage,
            purge_storage,
        }
    }

    /// Start all workers and return handles for graceful shutdown
    pub async fn start_workers(
        &self,
    ) -> Result<Vec<tokio::task::JoinHandle<()>>, Box<dyn std::error::Error + Send + Sync>> {
        let mut handles = Vec::new();

        // Worker for FetchCandlesJob
        let fetch_storage = (*self.fetch_storage).clone();
        let compose_storage = self.compose_storage.clone();
        let job_context = self.job_context.clone();
        handles.push(tokio::spawn(async move {
            let worker = WorkerBuilder::new("fetch-candles-worker")
                .data(job_context.clone())
                .data((*compose_storage).clone())
                .backend(fetch_storage)
                .build_fn(handlers::handle_fetch_candles);

            info!("SignalRuntime: FetchCandlesJob worker started");
            worker.run().await;
        }));

        // Worker for ComposeSignalJob
        let compose_storage_worker = (*self.compose_storage).clone();
        let store_storage = self.store_storage.clone();
        let job_context_compose = self.job_context.clone();
        handles.push(tokio::spawn(async move {
            let worker = WorkerBuilder::new("compose-signal-worker")
                .data(job_context_compose.clone())
                .data((*store_storage).clone())
                .backend(compose_storage_worker)
                .build_fn(handlers::handle_compose_signal);

            info!("SignalRuntime: ComposeSignalJob worker started");
            worker.run().await;
        }));

        // Worker for StoreSignalJob
        let store_storage_worker = (*self.store_storage).clone();
        let job_context_store = self.job_context.clone();
        handles.push(tokio::spawn(async move {
            let worker = WorkerBuilder::new("store-signal-worker")
                .data(job_context_store.clone())
                .backend(store_storage_worker)
                .build_fn(handlers::handle_store_signal);

            info!("SignalRuntime: StoreSignalJob worker started");
            worker.run().await;
        }));

        // Worker for EvaluateOutcomesJob
        let evaluate_storage_worker = (*self.evaluate_storage).clone();
        let job_context_evaluate = self.job_context.clone();
        handles.push(tokio::spawn(async move {
            let worker = WorkerBuilder::new("evaluate-outcomes-worker")
                .data(job_context_evaluate.clone())
                .backend(evaluate_storage_worker)
                .build_fn(handlers::handle_evaluate_outcomes);

            info!("SignalRuntime: EvaluateOutcomesJob worker started");
            worker.run().await;
        }));

        // Worker for PurgeSignalsJob
        let purge_storage_worker = (*self.purge_storage).clone();
        let job_context_purge = self.job_context.clone();
        handles.push(tokio::spawn(async move {
            let worker = WorkerBuilder::new("purge-signals-worker")
                .data(job_context_purge.clone())
                .backend(purge_storage_worker)
                .build_fn(handlers::handle_purge_signals);

            info!("SignalRuntime: PurgeSignalsJob worker started");
            worker.run().await;
        }));

        info!("SignalRuntime: all workers started");
        Ok(handles)
    }
}
