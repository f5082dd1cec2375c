// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-boundary configuration.
//!
//! Everything here is opaque input to the core constructors: which namespace
//! the operator itself runs in, optional overrides scoping the observer
//! watch, the GVK of the workload custom resource to detect, and the bind
//! address of the metrics/probe server. Flags override the corresponding
//! environment variables.

use clap::Parser;
use kube::core::{ApiResource, GroupVersionKind};

use crate::constants::{
    DEFAULT_WORKLOAD_GROUP, DEFAULT_WORKLOAD_KIND, DEFAULT_WORKLOAD_PLURAL,
    DEFAULT_WORKLOAD_VERSION, METRICS_SERVER_BIND_ADDRESS,
};

/// Command-line and environment configuration for the operator process.
#[derive(Parser, Clone, Debug)]
#[command(name = "routewatch", about = "Route exposure operator", version)]
pub struct OperatorConfig {
    /// Namespace the operator runs in. Required.
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: String,

    /// Restrict the WorkloadObserver watch to this namespace. When unset,
    /// observers are watched in the operator's own namespace.
    #[arg(long, env = "OBSERVER_NAMESPACE")]
    pub observer_namespace: Option<String>,

    /// Address the metrics and probe HTTP server binds to.
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub metrics_bind_address: String,

    /// API group of the workload custom resource detected in target namespaces.
    #[arg(long, env = "WORKLOAD_GROUP", default_value = DEFAULT_WORKLOAD_GROUP)]
    pub workload_group: String,

    /// API version of the workload custom resource.
    #[arg(long, env = "WORKLOAD_VERSION", default_value = DEFAULT_WORKLOAD_VERSION)]
    pub workload_version: String,

    /// Kind of the workload custom resource.
    #[arg(long, env = "WORKLOAD_KIND", default_value = DEFAULT_WORKLOAD_KIND)]
    pub workload_kind: String,

    /// Plural resource name of the workload custom resource.
    #[arg(long, env = "WORKLOAD_PLURAL", default_value = DEFAULT_WORKLOAD_PLURAL)]
    pub workload_plural: String,
}

impl OperatorConfig {
    /// Namespace in which `WorkloadObserver` resources are watched.
    #[must_use]
    pub fn observer_namespace(&self) -> &str {
        self.observer_namespace.as_deref().unwrap_or(&self.namespace)
    }

    /// `ApiResource` describing the workload kind, for dynamic-object watches
    /// and lists in the target namespace.
    #[must_use]
    pub fn workload_api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(
            &self.workload_group,
            &self.workload_version,
            &self.workload_kind,
        );
        ApiResource::from_gvk_with_plural(&gvk, &self.workload_plural)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
