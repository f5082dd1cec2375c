// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic.
//!
//! The parent reconciler ([`observer`]) owns the observer lifecycle:
//! finalizers, namespace claims, sub-controller start/stop/notify, and the
//! bridge-namespace route. Each sub-controller runs [`target`] against its
//! workload namespace. Both converge routes through the pure [`policy`]
//! state machine via [`converge_route`], and both write status through
//! [`status::ObserverStatusUpdater`] in a single patch per pass.

pub mod finalizers;
pub mod observer;
pub mod policy;
pub mod retry;
pub mod status;
pub mod target;

use anyhow::Result;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client};
use thiserror::Error;
use tracing::info;

use crate::crd::{Condition, ManagementState, WorkloadObserver};
use crate::errors::is_not_found;
use crate::metrics;
use crate::reconcilers::policy::{exposure_conditions, plan, DesiredRoute, RouteAction};
use crate::reconcilers::retry::{retry_api_operation, ExponentialBackoff};
use crate::route_api::Route;

/// Error type at the controller boundary.
///
/// Reconcilers use `anyhow` internally; the controller runtime requires
/// `std::error::Error`, so this transparent wrapper sits in between.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ReconcileError(#[from] pub anyhow::Error);

/// True when the observer's status lags behind its spec generation.
#[must_use]
pub fn is_stale(observer: &WorkloadObserver) -> bool {
    let generation = observer.metadata.generation;
    let observed = observer.status.as_ref().and_then(|s| s.observed_generation);
    generation != observed
}

/// Converge one route to its declared management state and return the
/// resulting condition block.
///
/// Reads the current route, plans via the policy, applies the action with
/// retry, then re-reads to compute conditions from the freshest state. A
/// route that vanishes concurrently is a valid terminal state, not an error.
///
/// # Errors
///
/// Returns an error when a route mutation fails past the retry budget; the
/// caller converts that into a requeue. Failed deletions under `Removed`
/// are reported as a `Degraded` condition instead, since the declared state
/// is explicit about the route being gone.
pub async fn converge_route(
    client: &Client,
    state: ManagementState,
    desired: &DesiredRoute,
    generation: Option<i64>,
) -> Result<Vec<Condition>> {
    let api: Api<Route> = Api::namespaced(client.clone(), &desired.namespace);
    let backoff = ExponentialBackoff::default();

    let observed = api.get_opt(&desired.name).await?;
    let action = plan(state, desired, observed.as_ref());

    match &action {
        RouteAction::Keep => {}
        RouteAction::Create(route) => {
            retry_api_operation(
                &format!("create route {}/{}", desired.namespace, desired.name),
                &backoff,
                || {
                    let api = api.clone();
                    let route = (**route).clone();
                    async move { api.create(&PostParams::default(), &route).await }
                },
            )
            .await?;
            metrics::record_route_write("create");
            info!("Created route {}/{}", desired.namespace, desired.name);
        }
        RouteAction::Replace(route) => {
            // Replace needs the live resourceVersion for optimistic locking.
            let mut replacement = (**route).clone();
            replacement.metadata.resource_version = observed
                .as_ref()
                .and_then(|r| r.metadata.resource_version.clone());
            retry_api_operation(
                &format!("replace route {}/{}", desired.namespace, desired.name),
                &backoff,
                || {
                    let api = api.clone();
                    let name = desired.name.clone();
                    let route = replacement.clone();
                    async move { api.replace(&name, &PostParams::default(), &route).await }
                },
            )
            .await?;
            metrics::record_route_write("update");
            info!("Replaced route {}/{}", desired.namespace, desired.name);
        }
        RouteAction::Delete => {
            let result = retry_api_operation(
                &format!("delete route {}/{}", desired.namespace, desired.name),
                &backoff,
                || {
                    let api = api.clone();
                    let name = desired.name.clone();
                    async move { api.delete(&name, &DeleteParams::default()).await }
                },
            )
            .await;
            match result {
                Ok(_) => {
                    metrics::record_route_write("delete");
                    info!("Deleted route {}/{}", desired.namespace, desired.name);
                }
                Err(e) if is_not_found(&e) => {}
                Err(e) => {
                    return Ok(policy::degraded_condition(
                        "RouteDeletionFailed",
                        &format!("Failed to delete route {}: {e}", desired.name),
                        generation,
                    ));
                }
            }
            // Nothing left to report once the route is gone.
            return Ok(Vec::new());
        }
    }

    let fresh = match &action {
        RouteAction::Keep => observed,
        _ => api.get_opt(&desired.name).await?,
    };
    Ok(exposure_conditions(state, fresh.as_ref(), generation))
}
