// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the routewatch operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the routewatch CRDs
pub const API_GROUP: &str = "routewatch.firestoned.io";

/// API version for the routewatch CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "routewatch.firestoned.io/v1alpha1";

/// Kind name for the `WorkloadObserver` resource
pub const KIND_WORKLOAD_OBSERVER: &str = "WorkloadObserver";

/// API group of the OpenShift Route kind
pub const ROUTE_API_GROUP: &str = "route.openshift.io";

/// Finalizer placed on `WorkloadObserver` resources so deletion can stop the
/// sub-controller and release the workload namespace claim first
pub const FINALIZER_WORKLOAD_OBSERVER: &str = "workloadobserver.routewatch.firestoned.io/finalizer";

// ============================================================================
// Default Watched-Workload Constants
// ============================================================================

/// Default API group of the workload custom resource detected in the target namespace
pub const DEFAULT_WORKLOAD_GROUP: &str = "installers.routewatch.firestoned.io";

/// Default API version of the workload custom resource
pub const DEFAULT_WORKLOAD_VERSION: &str = "v1alpha1";

/// Default kind of the workload custom resource
pub const DEFAULT_WORKLOAD_KIND: &str = "GatewayWorkload";

/// Default plural of the workload custom resource
pub const DEFAULT_WORKLOAD_PLURAL: &str = "gatewayworkloads";

// ============================================================================
// Route / Service / Secret Identity Constants
// ============================================================================

/// Name of the service fronted by the primary route in the target namespace.
/// The route reuses this name so route identity is deterministic.
pub const GATEWAY_SERVICE_NAME: &str = "gateway";

/// Name of the service fronted by the secondary route in the bridge namespace
pub const BRIDGE_SERVICE_NAME: &str = "bridge";

/// Label key used to select the gateway service in the target namespace
pub const GATEWAY_SERVICE_LABEL_KEY: &str = "app.kubernetes.io/component";

/// Label value used to select the gateway service in the target namespace
pub const GATEWAY_SERVICE_LABEL_VALUE: &str = "gateway";

/// Name of the secret carrying the CA bundle used when provisioning TLS routes
pub const CA_BUNDLE_SECRET_NAME: &str = "service-ca-bundle";

/// Key inside the CA bundle secret holding the PEM-encoded certificate
pub const CA_BUNDLE_SECRET_KEY: &str = "ca-bundle.crt";

/// Label key marking routes created by this operator
pub const MANAGED_BY_LABEL_KEY: &str = "app.kubernetes.io/managed-by";

/// Label value marking routes created by this operator
pub const MANAGED_BY_LABEL_VALUE: &str = "routewatch";

/// Annotation recording which `WorkloadObserver` a route was created for
pub const OWNER_ANNOTATION: &str = "routewatch.firestoned.io/owner";

/// Named service port routes forward to
pub const ROUTE_TARGET_PORT_NAME: &str = "https";

/// TLS termination mode used for managed routes
pub const ROUTE_TLS_TERMINATION: &str = "reencrypt";

/// Policy applied to plain-HTTP traffic hitting a managed route
pub const ROUTE_INSECURE_POLICY: &str = "Redirect";

// ============================================================================
// Condition Vocabulary
// ============================================================================

/// Condition type: the route exists and has been admitted by a router
pub const CONDITION_EXPOSED: &str = "Exposed";

/// Condition type: the declared state cannot currently be achieved
pub const CONDITION_DEGRADED: &str = "Degraded";

/// Condition type: the observer is fully reconciled
pub const CONDITION_READY: &str = "Ready";

/// Condition type: reconciliation is converging towards the declared state
pub const CONDITION_PROGRESSING: &str = "Progressing";

/// Condition type: another observer already claims the target namespace
pub const CONDITION_BACKUP: &str = "Backup";

// ============================================================================
// Watch Timing Constants
// ============================================================================
//
// Each watch carries its own timeout so the API server re-lists on a cadence
// matched to how expensive the kind is to list and how stale we can tolerate
// it being. These are configuration, not protocol.

/// Watch timeout for the `WorkloadObserver` itself (seconds)
pub const OBSERVER_WATCH_TIMEOUT_SECS: u32 = 120;

/// Watch timeout for the workload custom resource in the target namespace (seconds).
/// Shortest interval: workload appearance/disappearance drives everything else.
pub const WORKLOAD_WATCH_TIMEOUT_SECS: u32 = 60;

/// Watch timeout for label-selected services (seconds)
pub const SERVICE_WATCH_TIMEOUT_SECS: u32 = 180;

/// Watch timeout for the name-selected CA bundle secret (seconds)
pub const SECRET_WATCH_TIMEOUT_SECS: u32 = 240;

/// Watch timeout for routes in the target namespace (seconds)
pub const ROUTE_WATCH_TIMEOUT_SECS: u32 = 180;

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration while the observer is still converging (30 seconds)
pub const PROGRESSING_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration once the observer is Ready (5 minutes)
pub const READY_REQUEUE_DURATION_SECS: u64 = 300;

// ============================================================================
// Parent-to-Child Signaling Constants
// ============================================================================

/// Capacity of the bounded notification channel between the parent reconciler
/// and a sub-controller. Overflow drops the notification: reconciliation
/// re-reads current cluster state, and a full buffer means a wakeup is
/// already pending.
pub const NOTIFY_CHANNEL_CAPACITY: usize = 4;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address for the metrics and probe HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
