// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use super::*;
use crate::route_api::{RouteIngress, RouteIngressCondition, RouteStatus};

fn desired() -> DesiredRoute {
    DesiredRoute {
        name: "gateway".to_string(),
        namespace: "workload-ns".to_string(),
        hostname: Some("gw.apps.example.com".to_string()),
        service_name: "gateway".to_string(),
        destination_ca_certificate: Some("-----BEGIN CERTIFICATE-----".to_string()),
        owner: "op-ns/observer".to_string(),
    }
}

fn existing_route() -> Route {
    build_route(&desired())
}

fn with_admission(mut route: Route, status: &str) -> Route {
    route.status = Some(RouteStatus {
        ingress: vec![RouteIngress {
            host: Some("gw.apps.example.com".to_string()),
            router_name: Some("default".to_string()),
            conditions: vec![RouteIngressCondition {
                r#type: "Admitted".to_string(),
                status: status.to_string(),
                ..Default::default()
            }],
        }],
    });
    route
}

#[test]
fn managed_with_no_route_creates() {
    let action = plan(ManagementState::Managed, &desired(), None);
    match action {
        RouteAction::Create(route) => {
            assert_eq!(route.spec.host.as_deref(), Some("gw.apps.example.com"));
            assert_eq!(route.spec.to.name, "gateway");
        }
        other => panic!("expected create, got {other:?}"),
    }
}

#[test]
fn managed_with_matching_route_keeps() {
    let route = existing_route();
    assert_eq!(
        plan(ManagementState::Managed, &desired(), Some(&route)),
        RouteAction::Keep
    );
}

#[test]
fn managed_with_diverged_hostname_replaces() {
    let mut route = existing_route();
    route.spec.host = Some("other.example.com".to_string());
    match plan(ManagementState::Managed, &desired(), Some(&route)) {
        RouteAction::Replace(replacement) => {
            assert_eq!(replacement.spec.host.as_deref(), Some("gw.apps.example.com"));
        }
        other => panic!("expected replace, got {other:?}"),
    }
}

#[test]
fn managed_with_missing_tls_replaces() {
    let mut route = existing_route();
    route.spec.tls = None;
    assert!(matches!(
        plan(ManagementState::Managed, &desired(), Some(&route)),
        RouteAction::Replace(_)
    ));
}

#[test]
fn managed_with_diverged_ca_replaces() {
    let mut route = existing_route();
    if let Some(tls) = &mut route.spec.tls {
        tls.destination_ca_certificate = Some("different".to_string());
    }
    assert!(matches!(
        plan(ManagementState::Managed, &desired(), Some(&route)),
        RouteAction::Replace(_)
    ));
}

#[test]
fn absent_hostname_accepts_platform_assigned_host() {
    let mut want = desired();
    want.hostname = None;
    let mut route = build_route(&want);
    // The router assigned a host after creation.
    route.spec.host = Some("generated.apps.example.com".to_string());
    assert_eq!(
        plan(ManagementState::Managed, &want, Some(&route)),
        RouteAction::Keep
    );
}

#[test]
fn unmanaged_never_acts() {
    let route = existing_route();
    assert_eq!(
        plan(ManagementState::Unmanaged, &desired(), Some(&route)),
        RouteAction::Keep
    );
    assert_eq!(
        plan(ManagementState::Unmanaged, &desired(), None),
        RouteAction::Keep
    );
}

#[test]
fn removed_deletes_existing_route() {
    let route = existing_route();
    assert_eq!(
        plan(ManagementState::Removed, &desired(), Some(&route)),
        RouteAction::Delete
    );
}

#[test]
fn removed_deletes_route_without_ownership_marker() {
    // Intent governs the named route identity, not provenance.
    let mut route = existing_route();
    route.metadata.labels = None;
    route.metadata.annotations = None;
    assert_eq!(
        plan(ManagementState::Removed, &desired(), Some(&route)),
        RouteAction::Delete
    );
}

#[test]
fn removed_with_no_route_keeps() {
    assert_eq!(
        plan(ManagementState::Removed, &desired(), None),
        RouteAction::Keep
    );
}

#[test]
fn built_route_carries_marker_and_owner() {
    let route = build_route(&desired());
    let labels = route.metadata.labels.as_ref().unwrap();
    assert_eq!(
        labels.get(MANAGED_BY_LABEL_KEY).map(String::as_str),
        Some(MANAGED_BY_LABEL_VALUE)
    );
    let annotations = route.metadata.annotations.as_ref().unwrap();
    assert_eq!(
        annotations.get(OWNER_ANNOTATION).map(String::as_str),
        Some("op-ns/observer")
    );
}

#[test]
fn admitted_reports_router_verdict() {
    assert_eq!(admitted(&with_admission(existing_route(), "True")), Some(true));
    assert_eq!(
        admitted(&with_admission(existing_route(), "False")),
        Some(false)
    );
    assert_eq!(admitted(&existing_route()), None);
}

#[test]
fn exposure_conditions_empty_for_unmanaged_and_removed() {
    let route = with_admission(existing_route(), "True");
    assert!(exposure_conditions(ManagementState::Unmanaged, Some(&route), Some(3)).is_empty());
    assert!(exposure_conditions(ManagementState::Removed, None, Some(3)).is_empty());
}

#[test]
fn exposure_conditions_track_admission() {
    let admitted_route = with_admission(existing_route(), "True");
    let conds = exposure_conditions(ManagementState::Managed, Some(&admitted_route), Some(7));
    assert_eq!(conds.len(), 1);
    assert_eq!(conds[0].r#type, CONDITION_EXPOSED);
    assert_eq!(conds[0].status, "True");
    assert_eq!(conds[0].observed_generation, Some(7));

    let pending = exposure_conditions(ManagementState::Managed, Some(&existing_route()), Some(7));
    assert_eq!(pending[0].status, "Unknown");
}

#[test]
fn refused_admission_degrades() {
    let refused = with_admission(existing_route(), "False");
    let conds = exposure_conditions(ManagementState::Managed, Some(&refused), Some(2));
    assert_eq!(conds.len(), 2);
    assert_eq!(conds[0].r#type, CONDITION_EXPOSED);
    assert_eq!(conds[0].status, "False");
    assert_eq!(conds[1].r#type, CONDITION_DEGRADED);
    assert_eq!(conds[1].status, "True");
    assert!(conds.iter().all(|c| c.observed_generation == Some(2)));
}

#[test]
fn missing_route_under_managed_reports_unknown() {
    let conds = exposure_conditions(ManagementState::Managed, None, Some(1));
    assert_eq!(conds.len(), 1);
    assert_eq!(conds[0].status, "Unknown");
    assert_eq!(conds[0].reason.as_deref(), Some("RouteCreating"));
}
