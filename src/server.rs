// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP server for health probes and Prometheus metrics.
//!
//! Exposes three endpoints:
//! - `/healthz` - liveness probe, always 200 while the process runs
//! - `/readyz` - readiness probe, 200 once the server is up
//! - `/metrics` - Prometheus text exposition of [`crate::metrics`]

use anyhow::{Context as _, Result};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tracing::info;

use crate::constants::METRICS_SERVER_PATH;
use crate::metrics;

/// Run the probe/metrics server until the process exits.
///
/// # Errors
///
/// Returns an error if the bind address is invalid or the listener cannot
/// be created.
pub async fn run(bind_address: &str) -> Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(METRICS_SERVER_PATH, get(metrics_handler));

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind metrics server to {bind_address}"))?;

    info!("Metrics and probe server listening on {}", bind_address);

    axum::serve(listener, app)
        .await
        .context("metrics server terminated")?;
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to render metrics: {e}"),
        ),
    }
}
