// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed bindings for the OpenShift `route.openshift.io/v1` Route kind.
//!
//! Routes are not part of `k8s-openapi`, so the kind is declared here with
//! the same derive machinery used for our own CRDs. Only the fields this
//! operator reads or writes are modeled; unknown fields are preserved by the
//! API server, not by us, which is fine because updates go through full
//! object replacement of routes we created ourselves.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Route exposes a service at a hostname routed by the platform router.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    namespaced
)]
#[kube(status = "RouteStatus", derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Hostname the route answers on. When absent at creation, the platform
    /// router assigns one and reports it through status ingress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// The service this route fronts.
    pub to: RouteTargetReference,

    /// Target port on the fronted service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,

    /// TLS termination configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

/// Reference from a route to the service backing it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    /// Kind of the target; only "Service" is meaningful here.
    pub kind: String,

    /// Name of the target service.
    pub name: String,

    /// Relative weight of this target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

/// Port selection on the fronted service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Port name or number on the service.
    pub target_port: IntOrString,
}

/// TLS configuration for a route.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Termination type: "edge", "passthrough" or "reencrypt".
    pub termination: String,

    /// How insecure (plain HTTP) traffic is handled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,

    /// PEM-encoded CA certificate of the destination for re-encrypt routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ca_certificate: Option<String>,
}

/// Observed state of a route as reported by routers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    /// Per-router exposure records.
    #[serde(default)]
    pub ingress: Vec<RouteIngress>,
}

/// One router's view of the route.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteIngress {
    /// Hostname this router exposes the route on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Name of the reporting router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_name: Option<String>,

    /// Router conditions; `Admitted` is the one that matters to us.
    #[serde(default)]
    pub conditions: Vec<RouteIngressCondition>,
}

/// Condition attached by a router to a route ingress record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteIngressCondition {
    /// Condition type, e.g. "Admitted".
    pub r#type: String,

    /// "True", "False" or "Unknown".
    pub status: String,

    /// Machine-readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// RFC3339 timestamp of the last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

#[cfg(test)]
#[path = "route_api_tests.rs"]
mod route_api_tests;
