// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for route exposure management.
//!
//! This module defines the `WorkloadObserver` custom resource, the singleton
//! declaration that drives the operator: which namespace hosts the managed
//! workload, which companion (bridge) namespace exists alongside it, and how
//! the two routes that expose them should be managed.
//!
//! # Resource Types
//!
//! - [`WorkloadObserver`] - Declares a target workload namespace and the
//!   desired management state of its primary and secondary routes
//!
//! # Example: Creating a WorkloadObserver
//!
//! ```yaml
//! apiVersion: routewatch.firestoned.io/v1alpha1
//! kind: WorkloadObserver
//! metadata:
//!   name: observer
//!   namespace: routewatch-operator
//! spec:
//!   targetNamespace: workload-ns
//!   bridgeNamespace: bridge-ns
//!   primaryRoute:
//!     hostname: gateway.apps.example.com
//!     managementState: Managed
//!   secondaryRoute:
//!     managementState: Unmanaged
//! ```
//!
//! Status subfields (`conditions`, `managedWorkload`, per-route condition
//! blocks) are written exclusively by the reconciliation loop and are
//! recomputed on every pass; they describe current state, not history.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declared intent governing whether the operator controls a given route.
///
/// Any value outside this vocabulary is rejected at the schema boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ManagementState {
    /// The operator creates the route and keeps it converged to the spec.
    #[default]
    Managed,
    /// The operator neither touches the route nor tracks its state.
    Unmanaged,
    /// The operator deletes the route if it exists, regardless of who
    /// created it. Management state declares intent over the route identity,
    /// not ownership provenance.
    Removed,
}

/// Desired management of a single route.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteManagementSpec {
    /// Hostname the route should carry.
    ///
    /// Advisory: when absent, the platform router assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(regex(
        pattern = r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ))]
    pub hostname: Option<String>,

    /// Whether the operator manages this route. Defaults to `Managed`.
    #[serde(default)]
    pub management_state: ManagementState,
}

/// `WorkloadObserver` declares a workload namespace to observe and the
/// desired exposure of its routes.
///
/// One observer instance claims one target namespace. If two observers name
/// the same target namespace, the first claim wins; the loser carries a
/// `Backup=True` condition and performs no route mutations for that workload.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "routewatch.firestoned.io",
    version = "v1alpha1",
    kind = "WorkloadObserver",
    namespaced,
    doc = "WorkloadObserver declares a workload namespace to observe and drives the routes exposing it. The operator spawns a dedicated per-namespace sub-controller for each observed namespace."
)]
#[kube(status = "WorkloadObserverStatus")]
#[serde(rename_all = "camelCase")]
pub struct WorkloadObserverSpec {
    /// Namespace hosting the managed workload. A sub-controller scoped to
    /// this namespace is created on demand and torn down when the observer
    /// is deleted or retargeted.
    #[schemars(regex(pattern = r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$"))]
    pub target_namespace: String,

    /// Companion namespace whose route is reconciled directly by the parent.
    #[schemars(regex(pattern = r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$"))]
    pub bridge_namespace: String,

    /// Management of the route fronting the workload gateway service in the
    /// target namespace.
    pub primary_route: RouteManagementSpec,

    /// Management of the route fronting the bridge service in the bridge
    /// namespace.
    pub secondary_route: RouteManagementSpec,
}

/// Status of a `WorkloadObserver`, written only via the status subresource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadObserverStatus {
    /// Top-level conditions (Ready, Progressing, Degraded, Backup).
    /// Keyed by type: at most one condition per type.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Reference to the detected workload in the target namespace. Unset
    /// while no qualifying workload exists or while another observer claims
    /// the namespace. Serialized as explicit `null` when unset: status is
    /// written via merge patch, and only `null` clears a previously-set
    /// reference on the server.
    #[serde(default)]
    pub managed_workload: Option<ManagedReference>,

    /// Exposure state of the primary route.
    #[serde(default)]
    pub primary_route: RouteExposureStatus,

    /// Exposure state of the secondary route.
    #[serde(default)]
    pub secondary_route: RouteExposureStatus,

    /// Spec generation most recently processed by the reconciler. Readers
    /// compare this (and per-condition `observedGeneration`) against
    /// `metadata.generation` to detect staleness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Per-route status block.
///
/// Intentionally empty when the route's `managementState` is `Unmanaged`:
/// the operator does not track what it does not manage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteExposureStatus {
    /// Conditions for this route (Exposed, Degraded). Keyed by type.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Condition represents an observation of a resource's current state.
///
/// `lastTransitionTime` moves only when `status` changes; message-only edits
/// keep the original timestamp. `observedGeneration` ties the condition to
/// the spec revision that produced it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition: Exposed, Degraded, Ready, Progressing or Backup.
    pub r#type: String,

    /// Status of the condition: "True", "False", or "Unknown".
    pub status: String,

    /// Machine-readable reason for the condition (CamelCase, non-empty).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message describing the condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// RFC3339 timestamp of the last `status` transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,

    /// The `metadata.generation` of the spec this condition reflects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Object reference to the detected workload resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedReference {
    /// Kind of the referenced workload object.
    pub kind: String,

    /// Name of the referenced workload object.
    pub name: String,

    /// Namespace of the referenced workload object.
    pub namespace: String,

    /// UID of the referenced workload object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Resource version of the referenced workload object at observation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl WorkloadObserver {
    /// The `namespace/name` key identifying this observer in logs and in the
    /// controller registry's claim table.
    #[must_use]
    pub fn observer_key(&self) -> String {
        format!(
            "{}/{}",
            self.metadata.namespace.as_deref().unwrap_or_default(),
            self.metadata.name.as_deref().unwrap_or_default()
        )
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
