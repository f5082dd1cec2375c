// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the routewatch operator.
//!
//! All metrics live in a global registry with the namespace prefix
//! `routewatch_firestoned_io_` (prometheus-safe version of
//! "routewatch.firestoned.io") and are exposed via the `/metrics` endpoint.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - operations and their outcomes, per resource type
//! - **Route Lifecycle Metrics** - route creations, updates and deletions
//! - **Sub-Controller Metrics** - running sub-controllers, dropped
//!   parent-to-child notifications, lost namespace claims

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all routewatch metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "routewatch_firestoned_io";

/// Global Prometheus metrics registry.
///
/// All metrics are registered here and exposed via the `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (`WorkloadObserver`, `Route`)
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of resource
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of route API writes performed by the policy
///
/// Labels:
/// - `operation`: `create`, `update` or `delete`
pub static ROUTE_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_route_writes_total"),
        "Total number of route create/update/delete operations",
    );
    let counter = CounterVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of sub-controllers currently running
///
/// Labels:
/// - `state`: always `running`; the label keeps the shape extensible
pub static SUBCONTROLLERS_ACTIVE: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_subcontrollers_active"),
        "Number of sub-controllers currently running",
    );
    let gauge = GaugeVec::new(opts, &["state"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Total number of parent-to-child notifications dropped
///
/// Labels:
/// - `reason`: `buffer_full` or `closed`
pub static NOTIFICATIONS_DROPPED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_notifications_dropped_total"),
        "Total number of parent-to-child notifications dropped",
    );
    let counter = CounterVec::new(opts, &["reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of namespace claims refused because another observer holds them
pub static CLAIM_CONFLICTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_claim_conflicts_total"),
        "Total number of workload namespace claims lost to another observer",
    );
    let counter = CounterVec::new(opts, &["target_namespace"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record a successful reconciliation with its duration.
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation with its duration.
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a route write by operation name.
pub fn record_route_write(operation: &str) {
    ROUTE_WRITES_TOTAL.with_label_values(&[operation]).inc();
}

/// Adjust the running sub-controller gauge by delta.
pub fn adjust_subcontrollers_active(delta: f64) {
    SUBCONTROLLERS_ACTIVE
        .with_label_values(&["running"])
        .add(delta);
}

/// Record a dropped parent-to-child notification.
pub fn record_notification_dropped(reason: &str) {
    NOTIFICATIONS_DROPPED_TOTAL
        .with_label_values(&[reason])
        .inc();
}

/// Record a lost workload-namespace claim.
pub fn record_claim_conflict(target_namespace: &str) {
    CLAIM_CONFLICTS_TOTAL
        .with_label_values(&[target_namespace])
        .inc();
}

/// Render all registered metrics in the Prometheus text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails or the buffer is not valid UTF-8.
pub fn render() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
