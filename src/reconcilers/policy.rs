// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Route reconciliation policy.
//!
//! Pure functions only: this module decides what should happen to a route
//! given its declared management state and the observed cluster object, and
//! what condition set results. It performs no I/O, so the whole state machine
//! is unit-testable without a cluster.
//!
//! The decision table, per route:
//!
//! | managementState | observed route            | action            |
//! |-----------------|---------------------------|-------------------|
//! | Managed         | absent                    | create            |
//! | Managed         | present, matches desired  | keep              |
//! | Managed         | present, diverges         | replace           |
//! | Unmanaged       | any                       | keep, no tracking |
//! | Removed         | present                   | delete            |
//! | Removed         | absent                    | keep              |
//!
//! `Removed` deletes even when the route carries no ownership marker:
//! management state declares intent over the route identity, not ownership
//! provenance.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use crate::constants::{
    CONDITION_DEGRADED, CONDITION_EXPOSED, MANAGED_BY_LABEL_KEY, MANAGED_BY_LABEL_VALUE,
    OWNER_ANNOTATION, ROUTE_INSECURE_POLICY, ROUTE_TARGET_PORT_NAME, ROUTE_TLS_TERMINATION,
};
use crate::crd::{Condition, ManagementState};
use crate::reconcilers::status::create_condition;
use crate::route_api::{Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};

/// Everything needed to construct the route a spec declares.
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredRoute {
    /// Deterministic route name (the fronted service's name).
    pub name: String,
    /// Namespace the route lives in.
    pub namespace: String,
    /// Hostname from the spec; `None` lets the platform router assign one.
    pub hostname: Option<String>,
    /// Service the route fronts.
    pub service_name: String,
    /// PEM CA bundle for re-encrypt termination, when available.
    pub destination_ca_certificate: Option<String>,
    /// `namespace/name` of the owning observer, recorded as an annotation.
    pub owner: String,
}

/// The action the policy selected for one route.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteAction {
    /// Create the route from scratch.
    Create(Box<Route>),
    /// Replace the existing route's spec with the desired one.
    Replace(Box<Route>),
    /// Delete the existing route.
    Delete,
    /// Nothing to do.
    Keep,
}

impl RouteAction {
    /// Short name for logs and metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Replace(_) => "update",
            Self::Delete => "delete",
            Self::Keep => "keep",
        }
    }
}

/// Decide what to do with one route.
#[must_use]
pub fn plan(
    state: ManagementState,
    desired: &DesiredRoute,
    observed: Option<&Route>,
) -> RouteAction {
    match (state, observed) {
        (ManagementState::Managed, None) => RouteAction::Create(Box::new(build_route(desired))),
        (ManagementState::Managed, Some(route)) => {
            if route_matches(route, desired) {
                RouteAction::Keep
            } else {
                RouteAction::Replace(Box::new(build_route(desired)))
            }
        }
        (ManagementState::Unmanaged, _) => RouteAction::Keep,
        (ManagementState::Removed, Some(_)) => RouteAction::Delete,
        (ManagementState::Removed, None) => RouteAction::Keep,
    }
}

/// Construct the route object a `DesiredRoute` describes.
///
/// Routes are marked with a managed-by label and an owner annotation so
/// humans and other controllers can tell where they came from. The marker is
/// informational: the policy never requires it before acting.
#[must_use]
pub fn build_route(desired: &DesiredRoute) -> Route {
    let labels = BTreeMap::from([(
        MANAGED_BY_LABEL_KEY.to_string(),
        MANAGED_BY_LABEL_VALUE.to_string(),
    )]);
    let annotations = BTreeMap::from([(OWNER_ANNOTATION.to_string(), desired.owner.clone())]);

    Route {
        metadata: ObjectMeta {
            name: Some(desired.name.clone()),
            namespace: Some(desired.namespace.clone()),
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: RouteSpec {
            host: desired.hostname.clone(),
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: desired.service_name.clone(),
                weight: Some(100),
            },
            port: Some(RoutePort {
                target_port: IntOrString::String(ROUTE_TARGET_PORT_NAME.to_string()),
            }),
            tls: Some(TlsConfig {
                termination: ROUTE_TLS_TERMINATION.to_string(),
                insecure_edge_termination_policy: Some(ROUTE_INSECURE_POLICY.to_string()),
                destination_ca_certificate: desired.destination_ca_certificate.clone(),
            }),
        },
        status: None,
    }
}

/// True when the observed route already satisfies the desired spec.
///
/// Hostname is checked only when the spec declares one; a platform-assigned
/// hostname on a spec without one is not divergence. Labels and annotations
/// are not compared: users may add their own, and the marker is advisory.
#[must_use]
pub fn route_matches(observed: &Route, desired: &DesiredRoute) -> bool {
    if let Some(hostname) = &desired.hostname {
        if observed.spec.host.as_deref() != Some(hostname.as_str()) {
            return false;
        }
    }

    if observed.spec.to.kind != "Service" || observed.spec.to.name != desired.service_name {
        return false;
    }

    let port_ok = observed.spec.port.as_ref().is_some_and(|p| {
        p.target_port == IntOrString::String(ROUTE_TARGET_PORT_NAME.to_string())
    });
    if !port_ok {
        return false;
    }

    match &observed.spec.tls {
        None => false,
        Some(tls) => {
            tls.termination == ROUTE_TLS_TERMINATION
                && tls.destination_ca_certificate == desired.destination_ca_certificate
        }
    }
}

/// Whether any router has admitted the route.
///
/// `Some(true)` once one ingress record carries `Admitted=True`,
/// `Some(false)` when a router explicitly refused, `None` while no router
/// has reported yet.
#[must_use]
pub fn admitted(route: &Route) -> Option<bool> {
    let status = route.status.as_ref()?;

    let mut refused = false;
    for ingress in &status.ingress {
        for cond in &ingress.conditions {
            if cond.r#type == "Admitted" {
                match cond.status.as_str() {
                    "True" => return Some(true),
                    "False" => refused = true,
                    _ => {}
                }
            }
        }
    }

    if refused {
        Some(false)
    } else {
        None
    }
}

/// Compute the condition block for one route after the policy's action has
/// been applied, from the freshest observed route state.
///
/// `Unmanaged` and `Removed` produce an empty block: the operator does not
/// track what it does not manage, and a removed route has no state left to
/// report. Failures during apply are reported separately via
/// [`degraded_condition`].
#[must_use]
pub fn exposure_conditions(
    state: ManagementState,
    observed: Option<&Route>,
    generation: Option<i64>,
) -> Vec<Condition> {
    if state != ManagementState::Managed {
        return Vec::new();
    }

    let Some(route) = observed else {
        return vec![create_condition(
            CONDITION_EXPOSED,
            "Unknown",
            "RouteCreating",
            "Route has not been created yet",
            generation,
        )];
    };

    match admitted(route) {
        Some(true) => {
            let host = route
                .status
                .as_ref()
                .and_then(|s| s.ingress.iter().find_map(|i| i.host.clone()))
                .or_else(|| route.spec.host.clone())
                .unwrap_or_default();
            vec![create_condition(
                CONDITION_EXPOSED,
                "True",
                "Admitted",
                &format!("Route {} admitted at host {host}", route.name_any()),
                generation,
            )]
        }
        Some(false) => vec![
            create_condition(
                CONDITION_EXPOSED,
                "False",
                "AdmissionRefused",
                &format!("Router refused to admit route {}", route.name_any()),
                generation,
            ),
            create_condition(
                CONDITION_DEGRADED,
                "True",
                "AdmissionRefused",
                "Declared route cannot be admitted by any router",
                generation,
            ),
        ],
        None => vec![create_condition(
            CONDITION_EXPOSED,
            "Unknown",
            "AwaitingAdmission",
            &format!("Route {} exists, no router has reported yet", route.name_any()),
            generation,
        )],
    }
}

/// Condition block reporting a failed route mutation.
#[must_use]
pub fn degraded_condition(reason: &str, message: &str, generation: Option<i64>) -> Vec<Condition> {
    vec![create_condition(
        CONDITION_DEGRADED,
        "True",
        reason,
        message,
        generation,
    )]
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod policy_tests;
