use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::managers::BroadcastChannelManager;
use crate::session::{SessionCounters, SessionSnapshot};
use crate::telemetry::{TelemetryHub, TelemetrySnapshot};

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct DebugHttpState {
    pub broadcasts: BroadcastChannelManager,
    pub telemetry: Arc<TelemetryHub>,
    token: Arc<String>,
}

impl DebugHttpState {
    pub fn new(
        broadcasts: BroadcastChannelManager,
        telemetry: Arc<TelemetryHub>,
        token: String,
    ) -> Self {
        Self {
            broadcasts,
            telemetry,
            token: Arc::new(token),
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let provided = extract_token(headers, query_token);
        match provided {
            Some(value) if value == *self.token => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    ServiceUnavailable(&'static str),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token"),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub acquiring: bool,
    pub calibrating: bool,
    pub reachable: bool,
}

/// Metrics endpoint response payload.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub counters: Option<SessionCounters>,
    pub diagnostics: TelemetrySnapshot,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: DebugHttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/snapshot", get(snapshot))
        .route("/metrics", get(metrics))
        .route("/snapshot-stream", get(snapshot_stream_handler))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: DebugHttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding debug HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving debug HTTP router")?;
    Ok(())
}

pub async fn health(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let latest = state.broadcasts.latest_snapshot();
    Ok(Json(HealthResponse {
        status: "ok",
        acquiring: latest.as_ref().is_some_and(|s| s.acquiring),
        calibrating: latest
            .as_ref()
            .is_some_and(|s| s.calibration.status == "running"),
        reachable: latest.as_ref().map(|s| s.reachable).unwrap_or(false),
    }))
}

pub async fn snapshot(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<SessionSnapshot>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    state
        .broadcasts
        .latest_snapshot()
        .map(Json)
        .ok_or(HttpServerError::ServiceUnavailable(
            "no snapshot published yet",
        ))
}

pub async fn metrics(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    Ok(Json(MetricsResponse {
        counters: state
            .broadcasts
            .latest_snapshot()
            .map(|snapshot| snapshot.counters),
        diagnostics: state.telemetry.snapshot(),
    }))
}

pub async fn snapshot_stream_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::SnapshotStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    sse::snapshots(&state.broadcasts)
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    static X_DEBUG_TOKEN: HeaderName = HeaderName::from_static("x-debug-token");

    headers
        .get(&X_DEBUG_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}
