// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use super::*;
use clap::Parser as _;

#[test]
fn namespace_is_required() {
    let result = OperatorConfig::try_parse_from(["routewatch"]);
    assert!(result.is_err());
}

#[test]
fn defaults_apply_when_only_namespace_given() {
    let config = OperatorConfig::try_parse_from(["routewatch", "--namespace", "op-ns"]).unwrap();
    assert_eq!(config.namespace, "op-ns");
    assert_eq!(config.observer_namespace(), "op-ns");
    assert_eq!(config.metrics_bind_address, METRICS_SERVER_BIND_ADDRESS);
    assert_eq!(config.workload_kind, DEFAULT_WORKLOAD_KIND);
}

#[test]
fn observer_namespace_override() {
    let config = OperatorConfig::try_parse_from([
        "routewatch",
        "--namespace",
        "op-ns",
        "--observer-namespace",
        "watch-ns",
    ])
    .unwrap();
    assert_eq!(config.observer_namespace(), "watch-ns");
}

#[test]
fn workload_api_resource_uses_configured_gvk() {
    let config = OperatorConfig::try_parse_from([
        "routewatch",
        "--namespace",
        "op-ns",
        "--workload-group",
        "apps.example.com",
        "--workload-version",
        "v2",
        "--workload-kind",
        "Widget",
        "--workload-plural",
        "widgets",
    ])
    .unwrap();

    let resource = config.workload_api_resource();
    assert_eq!(resource.group, "apps.example.com");
    assert_eq!(resource.version, "v2");
    assert_eq!(resource.kind, "Widget");
    assert_eq!(resource.plural, "widgets");
}

#[test]
fn default_workload_resource_plural_is_not_naive() {
    let config = OperatorConfig::try_parse_from(["routewatch", "--namespace", "op-ns"]).unwrap();
    let resource = config.workload_api_resource();
    assert_eq!(resource.plural, DEFAULT_WORKLOAD_PLURAL);
}
