// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Sub-controller reconcile body for one workload namespace.
//!
//! Runs once per watched change (workload CR, gateway service, CA bundle
//! secret, routes) or parent notification. Each pass re-derives everything
//! from cluster reads: detect the workload, resolve the fronted service and
//! the TLS CA bundle, converge the primary route through the policy, then
//! write the observer's status in one patch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{DynamicObject, ListParams};
use kube::core::ApiResource;
use kube::runtime::controller::Action;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, warn};

use crate::config::OperatorConfig;
use crate::constants::{
    CA_BUNDLE_SECRET_KEY, CA_BUNDLE_SECRET_NAME, CONDITION_DEGRADED, CONDITION_PROGRESSING,
    CONDITION_READY, ERROR_REQUEUE_DURATION_SECS, GATEWAY_SERVICE_LABEL_KEY,
    GATEWAY_SERVICE_LABEL_VALUE, GATEWAY_SERVICE_NAME, PROGRESSING_REQUEUE_DURATION_SECS,
    READY_REQUEUE_DURATION_SECS,
};
use crate::crd::{Condition, ManagedReference, ManagementState, WorkloadObserver};
use crate::errors::{classify, ErrorKind};
use crate::metrics;
use crate::reconcilers::policy::DesiredRoute;
use crate::reconcilers::status::{find_condition, ObserverStatusUpdater};
use crate::reconcilers::{converge_route, ReconcileError};

/// Context shared across one sub-controller's reconcile invocations.
pub struct TargetContext {
    /// Kubernetes API client.
    pub client: Client,
    /// Process configuration (workload GVK lives here).
    pub config: Arc<OperatorConfig>,
    /// The workload namespace this sub-controller observes.
    pub target_namespace: String,
}

/// Reconcile the primary route for the observer's target namespace.
///
/// # Errors
///
/// Returns an error when a cluster read or route mutation fails past the
/// retry budget; the error policy converts it into a requeue.
pub async fn reconcile_target(
    observer: Arc<WorkloadObserver>,
    ctx: Arc<TargetContext>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let result = reconcile_target_inner(&observer, &ctx).await;

    match &result {
        Ok(_) => metrics::record_reconciliation_success("Route", start.elapsed()),
        Err(_) => metrics::record_reconciliation_error("Route", start.elapsed()),
    }

    result.map_err(ReconcileError::from)
}

async fn reconcile_target_inner(
    observer: &WorkloadObserver,
    ctx: &TargetContext,
) -> Result<Action> {
    let namespace = observer.namespace().unwrap_or_default();
    let name = observer.name_any();

    // Re-read: the queued snapshot may be stale, and the observer may be
    // gone entirely. Not-found is terminal, not an error.
    let observer_api: Api<WorkloadObserver> = Api::namespaced(ctx.client.clone(), &namespace);
    let Some(observer) = observer_api.get_opt(&name).await? else {
        debug!("WorkloadObserver {namespace}/{name} deleted between enqueue and processing");
        return Ok(Action::await_change());
    };

    debug!(
        "Reconciling target namespace {} for WorkloadObserver {namespace}/{name}",
        ctx.target_namespace
    );

    let generation = observer.metadata.generation;
    let mut updater = ObserverStatusUpdater::new(&observer);

    let workload = detect_workload(ctx).await?;
    updater.set_managed_workload(workload.clone());

    let service_name = resolve_gateway_service(ctx).await?;
    let ca_bundle = read_ca_bundle(ctx).await?;
    if ca_bundle.is_none() {
        debug!(
            "CA bundle secret {CA_BUNDLE_SECRET_NAME} not present in {}, \
             route created without destination CA",
            ctx.target_namespace
        );
    }

    let state = observer.spec.primary_route.management_state;
    let desired = DesiredRoute {
        name: service_name.clone(),
        namespace: ctx.target_namespace.clone(),
        hostname: observer.spec.primary_route.hostname.clone(),
        service_name,
        destination_ca_certificate: ca_bundle,
        owner: observer.observer_key(),
    };

    let route_conditions = converge_route(&ctx.client, state, &desired, generation).await?;
    let requeue = apply_target_status(&mut updater, state, &route_conditions, workload.as_ref());
    updater.set_primary_route_conditions(route_conditions);
    updater.set_observed_generation();
    updater.apply(&ctx.client).await?;

    Ok(Action::requeue(requeue))
}

/// Derive the top-level Ready/Progressing/Degraded conditions from the
/// primary route's condition block, and pick the requeue interval.
fn apply_target_status(
    updater: &mut ObserverStatusUpdater,
    state: ManagementState,
    route_conditions: &[Condition],
    workload: Option<&ManagedReference>,
) -> Duration {
    let degraded = find_condition(route_conditions, CONDITION_DEGRADED)
        .is_some_and(|c| c.status == "True");
    let exposed = find_condition(route_conditions, crate::constants::CONDITION_EXPOSED)
        .map(|c| c.status.clone());

    if degraded {
        updater.set_condition(
            CONDITION_DEGRADED,
            "True",
            "RouteNotConverged",
            "Primary route could not be brought to its declared state",
        );
        updater.set_condition(CONDITION_READY, "False", "Degraded", "See Degraded condition");
        updater.set_condition(CONDITION_PROGRESSING, "False", "Degraded", "Blocked on route");
        return Duration::from_secs(ERROR_REQUEUE_DURATION_SECS);
    }

    updater.clear_condition(CONDITION_DEGRADED);

    match (state, exposed.as_deref()) {
        // Nothing to converge for routes we do not manage.
        (ManagementState::Unmanaged | ManagementState::Removed, _) => {
            updater.set_condition(
                CONDITION_READY,
                "True",
                "Reconciled",
                "Primary route is at its declared management state",
            );
            updater.set_condition(CONDITION_PROGRESSING, "False", "Reconciled", "Nothing to do");
            Duration::from_secs(READY_REQUEUE_DURATION_SECS)
        }
        (ManagementState::Managed, Some("True")) => {
            let message = match workload {
                Some(w) => format!("Route admitted; workload {} detected", w.name),
                None => "Route admitted; no workload detected yet".to_string(),
            };
            updater.set_condition(CONDITION_READY, "True", "RouteAdmitted", &message);
            updater.set_condition(CONDITION_PROGRESSING, "False", "RouteAdmitted", &message);
            Duration::from_secs(READY_REQUEUE_DURATION_SECS)
        }
        (ManagementState::Managed, _) => {
            updater.set_condition(
                CONDITION_READY,
                "False",
                "AwaitingAdmission",
                "Primary route exists, waiting for router admission",
            );
            updater.set_condition(
                CONDITION_PROGRESSING,
                "True",
                "AwaitingAdmission",
                "Converging primary route",
            );
            Duration::from_secs(PROGRESSING_REQUEUE_DURATION_SECS)
        }
    }
}

/// Detect the workload custom resource in the target namespace.
///
/// The workload kind is configured at the process boundary and watched as a
/// `DynamicObject`; the first instance found becomes the managed reference.
async fn detect_workload(ctx: &TargetContext) -> Result<Option<ManagedReference>> {
    let resource: ApiResource = ctx.config.workload_api_resource();
    let api: Api<DynamicObject> =
        Api::namespaced_with(ctx.client.clone(), &ctx.target_namespace, &resource);

    let workloads = api.list(&ListParams::default()).await?;
    let Some(workload) = workloads.items.first() else {
        debug!(
            "No {} found in namespace {}",
            ctx.config.workload_kind, ctx.target_namespace
        );
        return Ok(None);
    };

    if workloads.items.len() > 1 {
        warn!(
            "Multiple {} instances in namespace {}, tracking {}",
            ctx.config.workload_kind,
            ctx.target_namespace,
            workload.name_any()
        );
    }

    Ok(Some(ManagedReference {
        kind: ctx.config.workload_kind.clone(),
        name: workload.name_any(),
        namespace: ctx.target_namespace.clone(),
        uid: workload.metadata.uid.clone(),
        resource_version: workload.metadata.resource_version.clone(),
    }))
}

/// Resolve the name of the service the primary route fronts.
///
/// Prefers a label-selected lookup so renames on the workload side are
/// picked up; falls back to the conventional name when no labeled service
/// exists yet.
async fn resolve_gateway_service(ctx: &TargetContext) -> Result<String> {
    let api: Api<Service> = Api::namespaced(ctx.client.clone(), &ctx.target_namespace);
    let params = ListParams::default()
        .labels(&format!("{GATEWAY_SERVICE_LABEL_KEY}={GATEWAY_SERVICE_LABEL_VALUE}"));

    let services = api.list(&params).await?;
    match services.items.first() {
        Some(service) => Ok(service.name_any()),
        None => Ok(GATEWAY_SERVICE_NAME.to_string()),
    }
}

/// Read the PEM CA bundle used for re-encrypt termination, if present.
async fn read_ca_bundle(ctx: &TargetContext) -> Result<Option<String>> {
    let api: Api<Secret> = Api::namespaced(ctx.client.clone(), &ctx.target_namespace);
    let Some(secret) = api.get_opt(CA_BUNDLE_SECRET_NAME).await? else {
        return Ok(None);
    };

    let Some(data) = secret.data else {
        return Ok(None);
    };
    let Some(bytes) = data.get(CA_BUNDLE_SECRET_KEY) else {
        warn!(
            "Secret {}/{CA_BUNDLE_SECRET_NAME} exists but has no {CA_BUNDLE_SECRET_KEY} key",
            ctx.target_namespace
        );
        return Ok(None);
    };

    match String::from_utf8(bytes.0.clone()) {
        Ok(pem) => Ok(Some(pem)),
        Err(_) => {
            warn!(
                "Secret {}/{CA_BUNDLE_SECRET_NAME} key {CA_BUNDLE_SECRET_KEY} is not UTF-8, \
                 ignoring",
                ctx.target_namespace
            );
            Ok(None)
        }
    }
}

/// Error policy for the sub-controller.
///
/// Conflicts requeue immediately (the next read observes the fresh
/// resourceVersion); everything else waits out the error interval.
pub fn error_policy_target(
    observer: Arc<WorkloadObserver>,
    error: &ReconcileError,
    _ctx: Arc<TargetContext>,
) -> Action {
    let requeue = requeue_for(error);
    info!(
        "Reconcile of {} failed, requeueing in {requeue:?}: {error}",
        observer.observer_key()
    );
    Action::requeue(requeue)
}

pub(crate) fn requeue_for(error: &ReconcileError) -> Duration {
    match error.0.downcast_ref::<kube::Error>().map(classify) {
        Some(ErrorKind::Conflict) => Duration::ZERO,
        _ => Duration::from_secs(ERROR_REQUEUE_DURATION_SECS),
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod target_tests;
