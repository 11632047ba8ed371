//! HTTP surface of the gateway
//!
//! - `POST /api/v1/commands` runs a command, or queues it when `async` is set
//! - `GET /api/v1/commands/:id` reports a queued command
//! - `GET /api/v1/health` summarizes the circuit breakers
//! - `GET /metrics` renders the Prometheus exposition

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use resilience::{CircuitState, ServiceHealth};
use serde::Serialize;
use shared_types::CommandRequest;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::orchestrator::CommandOrchestrator;

/// Authenticated user, set by the upstream auth layer
pub const USER_ID_HEADER: &str = "x-user-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CommandOrchestrator>,
    pub metrics: Option<PrometheusHandle>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<CommandOrchestrator>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            orchestrator,
            metrics,
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: AppState, body_limit_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/commands", post(submit_command))
        .route("/api/v1/commands/:id", get(command_status))
        .route("/api/v1/health", get(health))
        .route("/metrics", get(metrics))
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn user_id(headers: &HeaderMap) -> Result<String, GatewayError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Validation {
            message: format!("missing {} header", USER_ID_HEADER),
            details: Vec::new(),
        })
}

async fn submit_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Response {
    let request_id = request_id(&headers);
    match run_command(&state, &headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response_with_id(request_id),
    }
}

async fn run_command(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let user_id = user_id(headers)?;
    let Json(request) = body.map_err(|rejection| GatewayError::Validation {
        message: "malformed request body".to_string(),
        details: vec![rejection.body_text()],
    })?;

    if request.run_async {
        let queued = state.orchestrator.queue_command(&user_id, request).await?;
        Ok((StatusCode::ACCEPTED, Json(queued)).into_response())
    } else {
        let response = state.orchestrator.process_command(&user_id, request).await?;
        Ok(Json(response).into_response())
    }
}

async fn command_status(State(state): State<AppState>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    match state.orchestrator.get_command_status(&id).await {
        Ok(view) => Json(view).into_response(),
        Err(err) => err.into_response_with_id(request_id(&headers)),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub services: BTreeMap<String, ServiceHealth>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let services = state.orchestrator.registry().health();
    let status = if services.values().all(|s| s.circuit.state == CircuitState::Closed) {
        "healthy"
    } else {
        "degraded"
    };
    debug!(status = status, services = services.len(), "Health check");

    Json(HealthResponse {
        status,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        services,
    })
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
