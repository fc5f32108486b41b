//! Status endpoint: `/health` and `/stats`

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::ledger::{ReadingStore, StoreStats};
use crate::messaging::Transport;
use crate::observability::{Metrics, MetricsSnapshot};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StatusState {
    pub store: Arc<ReadingStore>,
    pub transport: Arc<dyn Transport>,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub store: StoreStats,
    pub last_prune: Option<String>,
    pub metrics: MetricsSnapshot,
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

pub async fn run<F>(address: SocketAddr, state: StatusState, shutdown: F) -> Result<(), AnyError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(address).await?;
    info!(%address, "Status server listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn health(State(state): State<StatusState>) -> impl IntoResponse {
    match state.store.health_check() {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            error!(error = %e, "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
    }
}

async fn stats(State(state): State<StatusState>) -> Result<Json<StatusResponse>, StatusCode> {
    let store = state.store.stats().map_err(|e| {
        error!(error = %e, "Failed to collect store stats");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let last_prune = state
        .store
        .last_prune()
        .map_err(|e| {
            error!(error = %e, "Failed to read last prune time");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map(|at| at.to_rfc3339());

    Ok(Json(StatusResponse {
        connected: state.transport.is_connected(),
        store,
        last_prune,
        metrics: state.metrics.snapshot(),
    }))
}
