//! HTTP server for health, readiness, and metrics endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

use crate::metrics::encode_metrics;

/// Default staleness threshold in seconds (5 minutes)
const DEFAULT_STALE_THRESHOLD_SECS: u64 = 300;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub topic: String,
    pub subscribed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_secs_ago: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

/// Shared state for health endpoints
#[derive(Clone)]
pub struct ServerState {
    pub topic: String,
    pub subscribed: Arc<AtomicBool>,
    /// Unix timestamp (seconds) of last inbound message, 0 if none
    pub last_message_epoch_secs: Arc<AtomicU64>,
    pub stale_threshold_secs: u64,
}

impl ServerState {
    pub fn new(
        topic: impl Into<String>,
        subscribed: Arc<AtomicBool>,
        last_message_epoch_secs: Arc<AtomicU64>,
    ) -> Self {
        Self {
            topic: topic.into(),
            subscribed,
            last_message_epoch_secs,
            stale_threshold_secs: DEFAULT_STALE_THRESHOLD_SECS,
        }
    }

    fn staleness_info(&self) -> (Option<u64>, bool) {
        let last_msg = self.last_message_epoch_secs.load(Ordering::SeqCst);
        if last_msg == 0 {
            return (None, false);
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let secs_ago = now.saturating_sub(last_msg);
        let stale = secs_ago > self.stale_threshold_secs;
        (Some(secs_ago), stale)
    }

    fn response(&self, status: &str, subscribed: bool) -> Json<HealthResponse> {
        let (last_message_secs_ago, stale) = self.staleness_info();
        Json(HealthResponse {
            status: status.to_string(),
            topic: self.topic.clone(),
            subscribed,
            last_message_secs_ago,
            stale,
        })
    }
}

/// Health endpoint - 200 while running, 503 when ingest has gone stale
async fn health(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let subscribed = state.subscribed.load(Ordering::SeqCst);
    let (_, stale) = state.staleness_info();

    if stale && subscribed {
        (StatusCode::SERVICE_UNAVAILABLE, state.response("stale", subscribed))
    } else {
        (StatusCode::OK, state.response("ok", subscribed))
    }
}

/// Ready endpoint - 200 only when subscribed and not stale
async fn ready(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    let subscribed = state.subscribed.load(Ordering::SeqCst);
    let (_, stale) = state.staleness_info();

    let status = if !subscribed {
        "not_subscribed"
    } else if stale {
        "stale"
    } else {
        "ready"
    };
    let code = if subscribed && !stale {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, state.response(status, subscribed))
}

/// Metrics endpoint - returns Prometheus text format
async fn metrics() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// Create the health server router
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server
pub async fn run_server(addr: SocketAddr, state: ServerState) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
