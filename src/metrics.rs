//! Prometheus metrics registry

use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
    pub signal_compositions_total: IntCounter,
    pub signals_actionable_total: IntCounter,
    pub outcomes_win_total: IntCounter,
    pub outcomes_loss_total: IntCounter,
    pub outcomes_untouched_total: IntCounter,
    pub current_threshold: Gauge,
    pub database_connected: Gauge,
    pub cache_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounter::with_opts(Opts::new(
            "http_requests_total",
            "Total HTTP requests processed",
        ))?;
        let http_requests_in_flight = IntGauge::with_opts(Opts::new(
            "http_requests_in_flight",
            "HTTP requests currently being processed",
        ))?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let signal_compositions_total = IntCounter::with_opts(Opts::new(
            "signal_compositions_total",
            "Signals composed",
        ))?;
        let signals_actionable_total = IntCounter::with_opts(Opts::new(
            "signals_actionable_total",
            "Composed signals that passed the confidence threshold",
        ))?;
        let outcomes_win_total =
            IntCounter::with_opts(Opts::new("outcomes_win_total", "Signals resolved as wins"))?;
        let outcomes_loss_total =
            IntCounter::with_opts(Opts::new("outcomes_loss_total", "Signals resolved as losses"))?;
        let outcomes_untouched_total = IntCounter::with_opts(Opts::new(
            "outcomes_untouched_total",
            "Signals that expired untouched",
        ))?;
        let current_threshold = Gauge::with_opts(Opts::new(
            "current_threshold",
            "Current confidence threshold",
        ))?;
        let database_connected = Gauge::with_opts(Opts::new(
            "database_connected",
            "1 when Postgres is connected",
        ))?;
        let cache_connected =
            Gauge::with_opts(Opts::new("cache_connected", "1 when Redis is connected"))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(signal_compositions_total.clone()))?;
        registry.register(Box::new(signals_actionable_total.clone()))?;
        registry.register(Box::new(outcomes_win_total.clone()))?;
        registry.register(Box::new(outcomes_loss_total.clone()))?;
        registry.register(Box::new(outcomes_untouched_total.clone()))?;
        registry.register(Box::new(current_threshold.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;
        registry.register(Box::new(cache_connected.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
            signal_compositions_total,
            signals_actionable_total,
            outcomes_win_total,
            outcomes_loss_total,
            outcomes_untouched_total,
            current_threshold,
            database_connected,
            cache_connected,
        })
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
