//! HTTP endpoint server using Axum

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

use crate::cache::RedisCache;
use crate::config;
use crate::db::SignalDatabase;
use crate::metrics::Metrics;
use crate::models::{SignalAction, Timeframe};
use crate::services::{ExchangeRestClient, MarketDataProvider, NarrativeClient, TelegramNotifier};
use crate::signals::{ComposerConfig, SignalComposer};
use crate::threshold::{
    AdjustmentReport, DynamicThreshold, ExecutionContext, InMemoryThresholdStore,
    RedisThresholdStore, ThresholdStore,
};

const CANDLE_FETCH_LIMIT: usize = 250;

/// Stable error body: `{status: "error", error_code, message}` with the
/// HTTP status mirroring the taxonomy.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_code: &'static str,
    message: String,
}

impl ApiError {
    pub fn invalid(error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error_code,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error_code: "UNAUTHORIZED",
            message: "Missing or invalid API key".to_string(),
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            error_code: "RATE_LIMITED",
            message: "Rate limit exceeded, retry later".to_string(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error_code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn store_unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error_code: "STORE_UNAVAILABLE",
            message: "Signal store is not available".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error_code: "INTERNAL",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "error_code": self.error_code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

/// API-key policy: requests must carry the key in `X-Api-Key`; the policy
/// is disabled entirely when no key is configured.
#[derive(Clone)]
pub struct AuthPolicy {
    api_key: Option<String>,
}

impl AuthPolicy {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    pub fn disabled() -> Self {
        Self { api_key: None }
    }

    pub fn allows(&self, headers: &HeaderMap) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .map(|got| got == expected)
                .unwrap_or(false),
        }
    }
}

/// Fixed-window request limiter shared across handlers
pub struct RateLimiter {
    max_per_window: u32,
    window: std::time::Duration,
    state: Mutex<(Instant, u32)>,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window: std::time::Duration) -> Self {
        Self {
            max_per_window,
            window,
            state: Mutex::new((Instant::now(), 0)),
        }
    }

    pub fn per_minute(max: u32) -> Self {
        Self::new(max, std::time::Duration::from_secs(60))
    }

    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (window_start, count) = *state;
        if window_start.elapsed() >= self.window {
            *state = (Instant::now(), 1);
            return true;
        }
        if count >= self.max_per_window {
            return false;
        }
        state.1 += 1;
        true
    }
}

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub provider: Arc<dyn MarketDataProvider>,
    pub database: Option<Arc<SignalDatabase>>,
    pub composer: Arc<SignalComposer>,
    pub threshold: Arc<DynamicThreshold>,
    pub narrative: Arc<NarrativeClient>,
    pub notifier: Arc<TelegramNotifier>,
    pub auth: AuthPolicy,
    pub rate_limiter: Arc<RateLimiter>,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    Ok(Json(json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "signalis-signal-engine"
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

/// Auth + rate-limit policy middleware for the /api surface. Health and
/// metrics stay open for probes and scrapers.
async fn policy_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !path.starts_with("/api") {
        return next.run(request).await;
    }

    if !state.auth.allows(request.headers()) {
        return ApiError::unauthorized().into_response();
    }

    if !state.rate_limiter.allow() {
        return ApiError::rate_limited().into_response();
    }

    next.run(request).await
}

#[derive(Debug, Deserialize)]
struct ComposeRequest {
    symbol: String,
    timeframe: String,
}

#[derive(Debug, Deserialize)]
struct SignalsQuery {
    symbol: Option<String>,
    limit: Option<usize>,
}

fn validate_symbol(symbol: &str) -> Result<(), ApiError> {
    let valid = (2..=20).contains(&symbol.len())
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ApiError::invalid(
            "INVALID_SYMBOL",
            format!("Symbol '{}' must be 2-20 uppercase alphanumerics", symbol),
        ))
    }
}

fn parse_timeframe(raw: &str) -> Result<Timeframe, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError::invalid("INVALID_TIMEFRAME", e))
}

fn signal_json(signal: &crate::models::Signal) -> Value {
    json!({
        "id": signal.id,
        "symbol": signal.symbol,
        "timeframe": signal.timeframe.as_str(),
        "action": signal.action.as_str(),
        "confidence": signal.confidence,
        "entry_price": signal.entry_price,
        "take_profit": signal.take_profit,
        "stop_loss": signal.stop_loss,
        "reasoning": signal.reasoning(),
        "narrative": signal.narrative,
        "created_at": signal.created_at,
        "outcome": signal.outcome.as_str(),
        "actual_return": signal.actual_return,
        "closed_at": signal.closed_at,
    })
}

/// Full composition pipeline: fetch, analyze, compose, gate, persist,
/// best-effort enrichment and notification.
async fn compose_signal(
    State(state): State<AppState>,
    Json(request): Json<ComposeRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_symbol(&request.symbol)?;
    let timeframe = parse_timeframe(&request.timeframe)?;

    let candles = match state
        .provider
        .get_candles(&request.symbol, timeframe, CANDLE_FETCH_LIMIT, None)
        .await
    {
        Ok(candles) => candles,
        Err(e) => {
            warn!(symbol = %request.symbol, error = %e, "Market data fetch failed");
            Vec::new()
        }
    };

    if candles.is_empty() {
        return Ok(Json(json!({
            "status": "error",
            "error_code": "NO_MARKET_DATA",
            "message": format!("No market data available for {}", request.symbol),
        })));
    }

    let composition = state
        .composer
        .compose(&request.symbol, timeframe, &candles);
    state.metrics.signal_compositions_total.inc();

    let volatility_pct = composition.indicators.as_ref().and_then(|snapshot| {
        snapshot
            .atr
            .filter(|_| snapshot.price > 0.0)
            .map(|atr| (atr / snapshot.price) * 100.0)
    });
    let context = ExecutionContext {
        volatility_pct,
        timeframe: Some(timeframe),
    };
    let decision = state
        .threshold
        .should_execute(composition.signal.confidence, &context)
        .await;
    state
        .metrics
        .current_threshold
        .set(decision.effective_threshold);

    let actionable = decision.approved && composition.signal.action != SignalAction::Hold;
    let mut signal = composition.signal.clone();

    if actionable {
        state.metrics.signals_actionable_total.inc();
        if let Some(narrative) = state
            .narrative
            .generate(&signal, composition.indicators.as_ref())
            .await
        {
            signal.narrative = Some(narrative);
        }
    }

    if let Some(ref db) = state.database {
        if let Err(e) = db.store_signal(&signal).await {
            // Storage failure is separate from composition success
            error!(signal_id = %signal.id, error = %e, "Failed to store signal");
        }
    }

    if actionable && state.notifier.is_enabled() {
        let sent = state.notifier.send_signal_alert(&signal).await;
        if !sent {
            warn!(signal_id = %signal.id, "Signal alert could not be delivered");
        }
    }

    Ok(Json(json!({
        "status": "success",
        "signal": signal_json(&signal),
        "actionable": actionable,
        "threshold": {
            "effective": decision.effective_threshold,
            "reason": decision.reason,
        },
    })))
}

/// List stored signals, optionally filtered by symbol
async fn list_signals(
    State(state): State<AppState>,
    Query(params): Query<SignalsQuery>,
) -> Result<Json<Value>, ApiError> {
    let db = state.database.as_ref().ok_or_else(ApiError::store_unavailable)?;

    if let Some(ref symbol) = params.symbol {
        validate_symbol(symbol)?;
    }
    let limit = params.limit.unwrap_or(50).min(500);

    let signals = db
        .get_signals(params.symbol.as_deref(), Some(limit))
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load signals");
            ApiError::internal("Failed to load signals")
        })?;

    let items: Vec<Value> = signals.iter().map(signal_json).collect();
    Ok(Json(json!({ "status": "success", "signals": items })))
}

/// Get a stored signal by ID
async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let db = state.database.as_ref().ok_or_else(ApiError::store_unavailable)?;

    let signal = db
        .get_signal(&id)
        .await
        .map_err(|e| {
            error!(error = %e, signal_id = %id, "Failed to load signal");
            ApiError::internal("Failed to load signal")
        })?
        .ok_or_else(|| ApiError::not_found(format!("Signal {} not found", id)))?;

    Ok(Json(json!({ "status": "success", "signal": signal_json(&signal) })))
}

/// Current threshold state plus the recent adjustment audit trail
async fn get_threshold(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let current = state.threshold.current().await;

    let adjustments = match state.database {
        Some(ref db) => db.get_recent_adjustments(20).await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load adjustment history");
            Vec::new()
        }),
        None => Vec::new(),
    };

    Ok(Json(json!({
        "status": "success",
        "threshold": {
            "current": current.current_threshold,
            "last_updated": current.last_updated,
            "min": state.threshold.config().min_threshold,
            "max": state.threshold.config().max_threshold,
        },
        "recent_adjustments": adjustments,
    })))
}

/// Manually trigger one evaluate-and-adjust cycle
async fn trigger_threshold_evaluation(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let db = state.database.as_ref().ok_or_else(ApiError::store_unavailable)?;

    let report = state.threshold.evaluate_and_adjust(db.as_ref()).await;
    if let AdjustmentReport::Adjusted(ref adjustment) = report {
        if let Err(e) = db.record_adjustment(adjustment).await {
            error!(error = %e, "Failed to record threshold adjustment");
        }
        if let Err(e) = db
            .prune_adjustments(config::adjustment_history_size())
            .await
        {
            warn!(error = %e, "Failed to prune adjustment history");
        }
    }

    Ok(Json(json!({ "status": "success", "report": report })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/signal", post(compose_signal))
        .route("/api/signals", get(list_signals))
        .route("/api/signals/{id}", get(get_signal))
        .route("/api/threshold", get(get_threshold))
        .route("/api/threshold/evaluate", post(trigger_threshold_evaluation))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    policy_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(Metrics::new()?);
    let start_time = Arc::new(Instant::now());

    // Cache is optional: without it candles come straight from the venue
    // and the threshold falls back to in-memory state.
    let cache = match RedisCache::new().await {
        Ok(c) => {
            info!("Redis connected for API server");
            metrics.cache_connected.set(1.0);
            Some(Arc::new(c))
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to Redis - continuing without cache");
            None
        }
    };

    // Database is optional: the API composes without it but history
    // endpoints report the store unavailable.
    let database = match SignalDatabase::new().await {
        Ok(db) => {
            info!("Postgres connected for API server");
            metrics.database_connected.set(1.0);
            Some(Arc::new(db))
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to Postgres - history endpoints will be unavailable");
            None
        }
    };

    let mut exchange = ExchangeRestClient::new();
    if let Some(ref c) = cache {
        exchange = exchange.with_cache(c.clone());
    }
    let provider: Arc<dyn MarketDataProvider> = Arc::new(exchange);

    let store: Arc<dyn ThresholdStore> = match cache {
        Some(ref c) => Arc::new(RedisThresholdStore::new(c.clone())),
        None => Arc::new(InMemoryThresholdStore::new()),
    };
    let threshold = Arc::new(DynamicThreshold::new(config::threshold_config(), store));

    let composer_config = ComposerConfig {
        weights: config::score_weights(),
        ..ComposerConfig::default()
    };

    let state = AppState {
        health: Arc::new(RwLock::new(HealthStatus::default())),
        metrics: metrics.clone(),
        start_time: start_time.clone(),
        provider,
        database,
        composer: Arc::new(SignalComposer::new(composer_config)),
        threshold,
        narrative: Arc::new(NarrativeClient::new(config::get_narrative_api_key())),
        notifier: Arc::new(TelegramNotifier::new(
            config::get_telegram_bot_token(),
            config::get_telegram_chat_id(),
        )),
        auth: AuthPolicy::new(config::get_api_key()),
        rate_limiter: Arc::new(RateLimiter::per_minute(config::rate_limit_per_minute())),
    };
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    axum::serve(listener, app).await?;

    Ok(())
}
