// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Parent reconciler for `WorkloadObserver` resources.
//!
//! Owns the observer lifecycle end to end:
//!
//! 1. deletion (finalizer): stop the sub-controller, release the claim;
//! 2. claim the target namespace, first-claim-wins; losers get `Backup=True`
//!    and mutate nothing in the contested namespace;
//! 3. lazily ensure a sub-controller for the target namespace;
//! 4. nudge the running sub-controller so spec edits take effect without
//!    waiting for its own watch cadence;
//! 5. converge the bridge-namespace route directly, with the same policy the
//!    sub-controller applies to the primary route;
//! 6. write status back in a single patch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use tracing::{debug, info, warn};

use crate::constants::{
    BRIDGE_SERVICE_NAME, CONDITION_BACKUP, CONDITION_DEGRADED, ERROR_REQUEUE_DURATION_SECS,
    FINALIZER_WORKLOAD_OBSERVER, KIND_WORKLOAD_OBSERVER, PROGRESSING_REQUEUE_DURATION_SECS,
    READY_REQUEUE_DURATION_SECS,
};
use crate::context::Context;
use crate::crd::WorkloadObserver;
use crate::errors::OperatorError;
use crate::metrics;
use crate::reconcilers::finalizers::{
    ensure_finalizer, handle_deletion, is_being_deleted, FinalizerCleanup,
};
use crate::reconcilers::policy::DesiredRoute;
use crate::reconcilers::status::ObserverStatusUpdater;
use crate::reconcilers::target::requeue_for;
use crate::reconcilers::{converge_route, is_stale, ReconcileError};
use crate::registry::{ClaimOutcome, ControllerRegistry};

/// Finalizer cleanup for an observer: stop its sub-controller and release
/// its workload-namespace claim. Safe to run twice.
struct ObserverCleanup {
    registry: Arc<ControllerRegistry>,
    observer_key: String,
}

#[async_trait]
impl FinalizerCleanup for ObserverCleanup {
    async fn cleanup(&self) -> Result<()> {
        if let Some(namespace) = self.registry.release(&self.observer_key) {
            self.registry.stop(&namespace);
        }
        Ok(())
    }
}

/// Reconcile one `WorkloadObserver`.
///
/// # Errors
///
/// Returns an error when a cluster call fails past the retry budget; the
/// error policy converts it into a requeue.
pub async fn reconcile_observer(
    observer: Arc<WorkloadObserver>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let result = reconcile_observer_inner(&observer, &ctx).await;

    match &result {
        Ok(_) => metrics::record_reconciliation_success(KIND_WORKLOAD_OBSERVER, start.elapsed()),
        Err(_) => metrics::record_reconciliation_error(KIND_WORKLOAD_OBSERVER, start.elapsed()),
    }

    result.map_err(ReconcileError::from)
}

async fn reconcile_observer_inner(
    observer: &Arc<WorkloadObserver>,
    ctx: &Context,
) -> Result<Action> {
    let namespace = observer.namespace().unwrap_or_default();
    let key = observer.observer_key();
    let api: Api<WorkloadObserver> = Api::namespaced(ctx.client.clone(), &namespace);

    if is_being_deleted(observer.as_ref()) {
        info!("WorkloadObserver {key} is being deleted");
        let cleanup = ObserverCleanup {
            registry: ctx.registry.clone(),
            observer_key: key,
        };
        handle_deletion(&api, observer.as_ref(), FINALIZER_WORKLOAD_OBSERVER, &cleanup).await?;
        return Ok(Action::await_change());
    }

    ensure_finalizer(&api, observer.as_ref(), FINALIZER_WORKLOAD_OBSERVER).await?;

    let target_namespace = observer.spec.target_namespace.clone();
    let generation = observer.metadata.generation;
    let mut updater = ObserverStatusUpdater::new(observer);

    // Schema validation should make this unreachable; guard anyway so a bad
    // object cannot claim the empty string as a namespace.
    if target_namespace.is_empty() {
        let err = OperatorError::InvalidSpec {
            observer: key.clone(),
            reason: "targetNamespace is empty".to_string(),
        };
        warn!("{err}");
        updater.set_condition(CONDITION_DEGRADED, "True", "InvalidSpec", &err.to_string());
        updater.set_observed_generation();
        updater.apply(&ctx.client).await?;
        return Ok(Action::requeue(Duration::from_secs(
            ERROR_REQUEUE_DURATION_SECS,
        )));
    }

    let mut progressing = is_stale(observer);
    if progressing {
        debug!("WorkloadObserver {key} status lags its spec generation");
    }

    // Retargeting: a spec edit pointing at a new namespace gives up the old
    // one first, so the old sub-controller stops before a new claim exists.
    if let Some(previous) = ctx.registry.claimed_namespace_of(&key) {
        if previous != target_namespace {
            info!("WorkloadObserver {key} retargeted from {previous} to {target_namespace}");
            ctx.registry.stop(&previous);
            ctx.registry.release(&key);
        }
    }

    match ctx.registry.claim(&target_namespace, &key) {
        ClaimOutcome::Refused { holder } => {
            info!(
                "Namespace {target_namespace} already claimed by {holder}, \
                 WorkloadObserver {key} standing by"
            );
            updater.set_condition(
                CONDITION_BACKUP,
                "True",
                "NamespaceClaimed",
                &format!("Workload namespace {target_namespace} is claimed by {holder}"),
            );
            updater.set_managed_workload(None);
        }
        ClaimOutcome::Granted | ClaimOutcome::AlreadyOwner => {
            updater.clear_condition(CONDITION_BACKUP);

            match ctx.registry.ensure(&target_namespace, observer) {
                Ok(started) => {
                    if started {
                        debug!("Sub-controller for {target_namespace} started on demand");
                        progressing = true;
                    }
                    ctx.registry.notify(&target_namespace, observer.clone());
                }
                Err(e) => {
                    warn!("Failed to start sub-controller for {target_namespace}: {e}");
                    updater.set_condition(
                        CONDITION_DEGRADED,
                        "True",
                        "SubControllerStartFailed",
                        &format!("Could not start observation of {target_namespace}: {e}"),
                    );
                    progressing = true;
                }
            }
        }
    }

    // The bridge route belongs to the parent: there is no sub-controller for
    // the bridge namespace and its claim table does not apply.
    let desired = DesiredRoute {
        name: BRIDGE_SERVICE_NAME.to_string(),
        namespace: observer.spec.bridge_namespace.clone(),
        hostname: observer.spec.secondary_route.hostname.clone(),
        service_name: BRIDGE_SERVICE_NAME.to_string(),
        destination_ca_certificate: None,
        owner: observer.observer_key(),
    };
    let bridge_conditions = converge_route(
        &ctx.client,
        observer.spec.secondary_route.management_state,
        &desired,
        generation,
    )
    .await?;
    updater.set_secondary_route_conditions(bridge_conditions);
    updater.set_observed_generation();
    updater.apply(&ctx.client).await?;

    let requeue = if progressing {
        Duration::from_secs(PROGRESSING_REQUEUE_DURATION_SECS)
    } else {
        Duration::from_secs(READY_REQUEUE_DURATION_SECS)
    };
    Ok(Action::requeue(requeue))
}

/// Error policy for the parent controller: conflicts requeue immediately,
/// everything else waits out the error interval.
pub fn error_policy_observer(
    observer: Arc<WorkloadObserver>,
    error: &ReconcileError,
    _ctx: Arc<Context>,
) -> Action {
    let requeue = requeue_for(error);
    info!(
        "Reconcile of WorkloadObserver {} failed, requeueing in {requeue:?}: {error}",
        observer.observer_key()
    );
    Action::requeue(requeue)
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod observer_tests;
