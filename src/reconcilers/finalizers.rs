// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer orchestration for namespaced resources.
//!
//! Deletion of an observer must stop its sub-controller and release its
//! workload-namespace claim before the object disappears, so observers carry
//! a finalizer. The flow:
//!
//! 1. first reconcile adds the finalizer if missing;
//! 2. when `deletionTimestamp` is set, [`FinalizerCleanup::cleanup`] runs;
//! 3. on success the finalizer is removed and the API server completes the
//!    delete.
//!
//! Cleanup must be idempotent: the reconcile can be retried at any point.

use anyhow::Result;
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use tracing::{debug, info};

/// Resource-specific teardown executed before the finalizer is removed.
///
/// `Send + Sync` so `&dyn FinalizerCleanup` can be held across awaits inside
/// reconcile futures handed to `Controller::run`.
#[async_trait]
pub trait FinalizerCleanup: Send + Sync {
    /// Release everything this resource holds. Must be safe to run twice.
    async fn cleanup(&self) -> Result<()>;
}

/// True when the resource is being deleted.
#[must_use]
pub fn is_being_deleted<K: Resource>(resource: &K) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

/// Add `finalizer` to the resource if not already present.
///
/// # Errors
///
/// Returns an error if the metadata patch fails.
pub async fn ensure_finalizer<K>(api: &Api<K>, resource: &K, finalizer: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    if resource.finalizers().iter().any(|f| f == finalizer) {
        return Ok(());
    }

    let name = resource.name_any();
    debug!("Adding finalizer {finalizer} to {name}");

    let mut finalizers = resource.finalizers().to_vec();
    finalizers.push(finalizer.to_string());

    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

/// Remove `finalizer` from the resource, letting deletion complete.
///
/// # Errors
///
/// Returns an error if the metadata patch fails; not-found is absorbed
/// because the object may already be gone.
pub async fn remove_finalizer<K>(api: &Api<K>, resource: &K, finalizer: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let name = resource.name_any();
    let finalizers: Vec<String> = resource
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != finalizer)
        .cloned()
        .collect();

    let patch = json!({ "metadata": { "finalizers": finalizers } });
    match api
        .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => {
            debug!("Removed finalizer {finalizer} from {name}");
            Ok(())
        }
        Err(e) if crate::errors::is_not_found(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Run cleanup and remove the finalizer for a resource under deletion.
///
/// # Errors
///
/// Returns an error if cleanup fails (the finalizer stays in place and the
/// reconcile retries) or the finalizer patch fails.
pub async fn handle_deletion<K>(
    api: &Api<K>,
    resource: &K,
    finalizer: &str,
    cleanup: &dyn FinalizerCleanup,
) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let name = resource.name_any();

    if !resource.finalizers().iter().any(|f| f == finalizer) {
        debug!("{name} deleted without our finalizer, nothing to clean up");
        return Ok(());
    }

    info!("Running finalizer cleanup for {name}");
    cleanup.cleanup().await?;
    remove_finalizer(api, resource, finalizer).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
