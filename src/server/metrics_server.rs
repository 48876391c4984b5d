// src/server/metrics_server.rs

//! A minimal ops surface: `GET /healthz` for liveness and `GET /metrics` for
//! plain-text dispatch/reaper counters. Not part of the control-plane API;
//! stations/producers/consumers only ever go through the pub/sub subjects.

use crate::core::state::BrokerState;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn metrics_handler(state: Arc<BrokerState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Runs the metrics server until the shutdown signal fires.
pub async fn run(state: Arc<BrokerState>, mut shutdown_rx: broadcast::Receiver<()>) {
    let port = state.config.metrics.port;

    let app = Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(move || metrics_handler(state.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("metrics server listening on http://{addr}/metrics");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, port, "failed to bind metrics server");
            return;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("metrics server shutting down");
        })
        .await
        .unwrap();
}
