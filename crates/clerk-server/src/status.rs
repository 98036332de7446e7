//! Optional HTTP listener exposing liveness, metrics and the tracked services.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::tracker::TrackerHandle;

#[derive(Clone)]
struct StatusState {
    tracker: TrackerHandle,
    metrics: Option<PrometheusHandle>,
}

pub fn router(tracker: TrackerHandle, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .route("/services", get(tracked_services))
        .with_state(StatusState { tracker, metrics })
}

pub async fn serve(
    addr: SocketAddr,
    tracker: TrackerHandle,
    metrics: Option<PrometheusHandle>,
    shutdown: CancellationToken,
) {
    info!("status endpoint listening on {}", addr);
    let server = axum::Server::bind(&addr)
        .serve(router(tracker, metrics).into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await });

    if let Err(e) = server.await {
        error!("status server error: {}", e);
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn render_metrics(State(state): State<StatusState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

async fn tracked_services(State(state): State<StatusState>) -> impl IntoResponse {
    match state.tracker.list_all().await {
        Ok(mut ids) => {
            ids.sort();
            (StatusCode::OK, Json(ids)).into_response()
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}
