//! Job context for dependency injection

use crate::db::SignalDatabase;
use crate::metrics::Metrics;
use crate::services::market_data::MarketDataProvider;
use crate::services::{NarrativeClient, TelegramNotifier};
use crate::signals::SignalComposer;
use crate::threshold::DynamicThreshold;
use std::sync::Arc;

/// Context passed to job handlers via the Apalis `Data<T>` pattern.
///
/// Handlers only read from these collaborators; the worker binary wires
/// them up once at startup.
pub struct JobContext {
    pub provider: Arc<dyn MarketDataProvider>,
    pub database: Option<Arc<SignalDatabase>>,
    pub composer: Arc<SignalComposer>,
    pub threshold: Arc<DynamicThreshold>,
    pub narrative: Arc<NarrativeClient>,
    pub notifier: Arc<TelegramNotifier>,
    pub metrics: Option<Arc<Metrics>>,
}
