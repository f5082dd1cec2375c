// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use super::*;

fn minimal_spec_yaml() -> &'static str {
    r"
targetNamespace: workload-ns
bridgeNamespace: bridge-ns
primaryRoute:
  hostname: gw.apps.example.com
secondaryRoute: {}
"
}

#[test]
fn management_state_defaults_to_managed() {
    let spec: WorkloadObserverSpec = serde_yaml::from_str(minimal_spec_yaml()).unwrap();
    assert_eq!(spec.primary_route.management_state, ManagementState::Managed);
    assert_eq!(spec.secondary_route.management_state, ManagementState::Managed);
    assert!(spec.secondary_route.hostname.is_none());
}

#[test]
fn management_state_accepts_exact_vocabulary() {
    let spec: RouteManagementSpec =
        serde_yaml::from_str("managementState: Unmanaged").unwrap();
    assert_eq!(spec.management_state, ManagementState::Unmanaged);

    let spec: RouteManagementSpec = serde_yaml::from_str("managementState: Removed").unwrap();
    assert_eq!(spec.management_state, ManagementState::Removed);
}

#[test]
fn unknown_management_state_is_rejected() {
    let result: Result<RouteManagementSpec, _> =
        serde_yaml::from_str("managementState: Paused");
    assert!(result.is_err());
}

#[test]
fn spec_round_trips_in_camel_case() {
    let spec: WorkloadObserverSpec = serde_yaml::from_str(minimal_spec_yaml()).unwrap();
    let json = serde_json::to_value(&spec).unwrap();
    assert_eq!(json["targetNamespace"], "workload-ns");
    assert_eq!(json["bridgeNamespace"], "bridge-ns");
    assert_eq!(json["primaryRoute"]["hostname"], "gw.apps.example.com");
}

#[test]
fn observer_key_is_namespace_slash_name() {
    let mut observer = WorkloadObserver::new(
        "observer",
        serde_yaml::from_str(minimal_spec_yaml()).unwrap(),
    );
    observer.metadata.namespace = Some("op-ns".to_string());
    assert_eq!(observer.observer_key(), "op-ns/observer");
}

#[test]
fn status_serialization_distinguishes_clearable_fields() {
    let status = WorkloadObserverStatus::default();
    let json = serde_json::to_value(&status).unwrap();
    // Status is written via merge patch: managedWorkload must serialize as
    // explicit null so clearing it actually removes the server-side value.
    assert!(json["managedWorkload"].is_null());
    assert!(json.get("managedWorkload").is_some());
    // observedGeneration never transitions back to unset, so it may be omitted.
    assert!(json.get("observedGeneration").is_none());
    assert_eq!(json["conditions"], serde_json::json!([]));
}

#[test]
fn crd_generation_produces_expected_names() {
    use crate::constants::{API_GROUP, API_GROUP_VERSION, API_VERSION, KIND_WORKLOAD_OBSERVER};
    use kube::CustomResourceExt;

    let crd = WorkloadObserver::crd();
    assert_eq!(crd.spec.group, API_GROUP);
    assert_eq!(crd.spec.names.kind, KIND_WORKLOAD_OBSERVER);
    assert_eq!(crd.spec.names.plural, "workloadobservers");
    assert_eq!(crd.spec.versions[0].name, API_VERSION);
    assert_eq!(API_GROUP_VERSION, format!("{API_GROUP}/{API_VERSION}"));
    assert!(crd.spec.versions[0].subresources.as_ref().unwrap().status.is_some());
}
