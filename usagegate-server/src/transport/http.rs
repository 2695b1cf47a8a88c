//! HTTP/JSON transport
//!
//! # API Endpoints
//!
//! ## POST /v1/throttle
//!
//! Rate-check an (identifier, endpoint) pair. Limit parameters are
//! optional; omitted values resolve from the configured limits table.
//!
//! ```json
//! { "identifier": "user:123", "endpoint": "generate-menu", "cost": 1 }
//! ```
//!
//! Response: `{ "allowed": true, "retry_after": 0 }`
//!
//! ## POST /v1/credits/consume, POST /v1/credits/grant
//!
//! Exactly-once balance mutations keyed by `idempotency_key`:
//!
//! ```json
//! { "subject_id": "user:123", "amount": 5, "idempotency_key": "generate-menu:user:123:2025-W31" }
//! ```
//!
//! Response: `{ "success": true, "new_balance": 25 }`. Denials and replays
//! are 200s carrying a `reason` — they are outcomes, not faults. Store
//! unavailability is a 503 (the ledgers fail closed).
//!
//! ## POST /v1/events
//!
//! Exactly-once award. With `event_id` the dedup key is the provider's id;
//! without it the (user, event type, reference-zone calendar day) window
//! applies. Response: `{ "awarded": true }`.
//!
//! ## GET /v1/credits/balance/{subject_id}, GET /health, GET /metrics

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use usagegate::{ControlError, RateLimit};

use super::Transport;
use crate::actor::ControlPlaneHandle;
use crate::config::LimitsTable;
use crate::metrics::Metrics;
use crate::types::{
    BalanceResponse, CreditRequest, EventRequest, EventResponse, ThrottleRequest,
    ThrottleResponse,
};
use crate::types::CreditResponse;

/// HTTP rate-check request
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpThrottleRequest {
    /// Who is being limited
    pub identifier: String,
    /// Which operation the limit guards
    pub endpoint: String,
    /// Bucket capacity (optional, resolved from the limits table)
    pub max_tokens: Option<f64>,
    /// Tokens per second (optional)
    pub refill_rate: Option<f64>,
    /// Tokens this call consumes (optional)
    pub cost: Option<f64>,
    /// Unix timestamp in nanoseconds (optional, defaults to current time)
    pub timestamp: Option<i64>,
}

/// HTTP credit consume/grant request
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpCreditRequest {
    pub subject_id: String,
    pub amount: i64,
    pub idempotency_key: String,
}

/// HTTP event request
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpEventRequest {
    pub user_id: String,
    pub event_type: String,
    /// Gamification points (optional, defaults to 0)
    pub points: Option<i64>,
    /// Credits to award (optional, defaults to 0)
    pub credits: Option<i64>,
    /// Provider event id; omit for daily-window rewards
    pub event_id: Option<String>,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    pub error: String,
}

/// Shared state behind every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub handle: ControlPlaneHandle,
    pub limits: LimitsTable,
    pub metrics: Arc<Metrics>,
}

/// HTTP transport implementation
pub struct HttpTransport {
    addr: SocketAddr,
}

impl HttpTransport {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid HTTP address {host}:{port}: {e}"))?;
        Ok(Self { addr })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(
        self,
        handle: ControlPlaneHandle,
        limits: LimitsTable,
        metrics: Arc<Metrics>,
    ) -> Result<()> {
        let app = router(AppState {
            handle,
            limits,
            metrics,
        });

        tracing::info!("HTTP server listening on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Build the control-plane router. Exposed for integration tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/throttle", post(handle_throttle))
        .route("/v1/credits/consume", post(handle_consume))
        .route("/v1/credits/grant", post(handle_grant))
        .route("/v1/credits/balance/{subject_id}", get(handle_balance))
        .route("/v1/events", post(handle_event))
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

type HttpError = (StatusCode, Json<HttpErrorResponse>);

fn error_response(err: ControlError) -> HttpError {
    let status = match err {
        ControlError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ControlError::InvalidLimit | ControlError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(HttpErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn parse_timestamp(nanos: Option<i64>) -> Result<SystemTime, HttpError> {
    match nanos {
        Some(nanos) if nanos < 0 => Err((
            StatusCode::BAD_REQUEST,
            Json(HttpErrorResponse {
                error: format!("invalid timestamp: {nanos}"),
            }),
        )),
        Some(nanos) => Ok(UNIX_EPOCH + Duration::from_nanos(nanos as u64)),
        None => Ok(SystemTime::now()),
    }
}

async fn handle_throttle(
    State(state): State<AppState>,
    Json(req): Json<HttpThrottleRequest>,
) -> Result<Json<ThrottleResponse>, HttpError> {
    let started = Instant::now();

    let configured = state.limits.resolve(&req.endpoint);
    let limit = RateLimit::new(
        req.max_tokens.unwrap_or(configured.max_tokens),
        req.refill_rate.unwrap_or(configured.refill_rate),
        req.cost.unwrap_or(configured.cost),
    );

    let internal_req = ThrottleRequest {
        identifier: req.identifier,
        endpoint: req.endpoint,
        limit,
        timestamp: parse_timestamp(req.timestamp)?,
    };

    match state.handle.throttle(internal_req).await {
        Ok(decision) => {
            if decision.failed_open {
                tracing::warn!("rate check failed open: store unavailable");
            }
            state
                .metrics
                .record_throttle(&decision, started.elapsed().as_micros() as u64);
            Ok(Json(ThrottleResponse::from(decision)))
        }
        Err(e) => {
            state
                .metrics
                .record_error(started.elapsed().as_micros() as u64);
            Err(error_response(e))
        }
    }
}

async fn handle_consume(
    State(state): State<AppState>,
    Json(req): Json<HttpCreditRequest>,
) -> Result<Json<CreditResponse>, HttpError> {
    let started = Instant::now();
    let internal_req = CreditRequest {
        subject_id: req.subject_id,
        amount: req.amount,
        idempotency_key: req.idempotency_key,
        timestamp: SystemTime::now(),
    };

    match state.handle.consume(internal_req).await {
        Ok(result) => {
            state
                .metrics
                .record_credit(&result, started.elapsed().as_micros() as u64);
            Ok(Json(CreditResponse::from(result)))
        }
        Err(e) => {
            state
                .metrics
                .record_error(started.elapsed().as_micros() as u64);
            tracing::error!("credit consume failed: {}", e);
            Err(error_response(e))
        }
    }
}

async fn handle_grant(
    State(state): State<AppState>,
    Json(req): Json<HttpCreditRequest>,
) -> Result<Json<CreditResponse>, HttpError> {
    let started = Instant::now();
    let internal_req = CreditRequest {
        subject_id: req.subject_id,
        amount: req.amount,
        idempotency_key: req.idempotency_key,
        timestamp: SystemTime::now(),
    };

    match state.handle.grant(internal_req).await {
        Ok(result) => {
            state
                .metrics
                .record_credit(&result, started.elapsed().as_micros() as u64);
            Ok(Json(CreditResponse::from(result)))
        }
        Err(e) => {
            state
                .metrics
                .record_error(started.elapsed().as_micros() as u64);
            tracing::error!("credit grant failed: {}", e);
            Err(error_response(e))
        }
    }
}

async fn handle_event(
    State(state): State<AppState>,
    Json(req): Json<HttpEventRequest>,
) -> Result<Json<EventResponse>, HttpError> {
    let started = Instant::now();
    let internal_req = EventRequest {
        user_id: req.user_id,
        event_type: req.event_type,
        points: req.points.unwrap_or(0),
        credits: req.credits.unwrap_or(0),
        event_id: req.event_id,
        // The daily-window boundary is derived from server time only, so
        // callers cannot move it
        timestamp: SystemTime::now(),
    };

    match state.handle.record_event(internal_req).await {
        Ok(outcome) => {
            state
                .metrics
                .record_event(outcome.awarded, started.elapsed().as_micros() as u64);
            Ok(Json(EventResponse::from(outcome)))
        }
        Err(e) => {
            state
                .metrics
                .record_error(started.elapsed().as_micros() as u64);
            tracing::error!("event record failed: {}", e);
            Err(error_response(e))
        }
    }
}

async fn handle_balance(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Json<BalanceResponse>, HttpError> {
    match state.handle.balance(subject_id.clone()).await {
        Ok(balance) => Ok(Json(BalanceResponse {
            subject_id,
            balance,
        })),
        Err(e) => Err(error_response(e)),
    }
}

async fn handle_metrics(State(state): State<AppState>) -> String {
    state.metrics.export_prometheus()
}
