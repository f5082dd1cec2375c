// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator entry point.
//!
//! Builds the Tokio runtime, initializes tracing, connects to the cluster
//! and runs three things until shutdown: the parent `WorkloadObserver`
//! controller, the metrics/probe HTTP server, and a signal handler that
//! stops every sub-controller before the process exits.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use futures::StreamExt;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use routewatch::config::OperatorConfig;
use routewatch::constants::{OBSERVER_WATCH_TIMEOUT_SECS, TOKIO_WORKER_THREADS};
use routewatch::context::Context;
use routewatch::crd::WorkloadObserver;
use routewatch::reconcilers::observer::{error_policy_observer, reconcile_observer};
use routewatch::registry::ControllerRegistry;
use routewatch::server;
use routewatch::subcontroller::KubeSubControllerFactory;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("routewatch-worker")
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run())
}

/// Initialize tracing from the environment.
///
/// `RUST_LOG` selects the filter (default `info`); `RUST_LOG_FORMAT=json`
/// switches to JSON output for log aggregation.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn run() -> Result<()> {
    init_tracing();

    let config = Arc::new(OperatorConfig::parse());
    info!(
        "Starting routewatch operator in namespace {} (observers watched in {})",
        config.namespace,
        config.observer_namespace()
    );

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let factory = Arc::new(KubeSubControllerFactory::new(client.clone(), config.clone()));
    let registry = Arc::new(ControllerRegistry::new(factory));
    let context = Arc::new(Context::new(client.clone(), config.clone(), registry.clone()));

    let observers: Api<WorkloadObserver> =
        Api::namespaced(client.clone(), config.observer_namespace());
    let observer_watch = watcher::Config::default().timeout(OBSERVER_WATCH_TIMEOUT_SECS);

    let parent = Controller::new(observers, observer_watch)
        .graceful_shutdown_on(shutdown_signal())
        .run(reconcile_observer, error_policy_observer, context)
        .for_each(|result| async {
            match result {
                Ok((obj, _)) => debug!("Reconciled WorkloadObserver {obj:?}"),
                Err(e) => debug!("Reconcile dispatch error: {e}"),
            }
        });

    let metrics_bind = config.metrics_bind_address.clone();
    tokio::select! {
        () = parent => {
            info!("Parent controller stream ended");
        }
        result = server::run(&metrics_bind) => {
            if let Err(e) = result {
                error!("Metrics server failed: {e}");
            }
        }
    }

    registry.shutdown_all();
    info!("routewatch operator shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {e}"),
    }
}
