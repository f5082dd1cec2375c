// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for the `WorkloadObserver` resource.
//!
//! Conditions follow the standard Kubernetes conventions with two extra
//! invariants enforced here:
//!
//! - `lastTransitionTime` moves only when `status` changes; reason- or
//!   message-only edits keep the previous timestamp.
//! - every condition carries the `observedGeneration` of the spec revision
//!   that produced it, so readers can detect staleness after a spec edit
//!   races a slow reconcile.
//!
//! Conditions are keyed by type: a status block holds at most one condition
//! per type, and blocks are recomputed on every reconcile, never appended to.

use crate::crd::{Condition, ManagedReference, WorkloadObserver, WorkloadObserverStatus};
use anyhow::Result;
use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Create a new condition with the current timestamp.
///
/// # Arguments
///
/// * `condition_type` - e.g. "Ready", "Exposed"
/// * `status` - "True", "False", or "Unknown"
/// * `reason` - programmatic identifier in `CamelCase`, non-empty
/// * `message` - human-readable explanation
/// * `observed_generation` - the spec generation this condition reflects
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
        observed_generation,
    }
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// Preserves `lastTransitionTime` when the status value is unchanged and
/// stamps a new one when it flips. Always refreshes reason, message and
/// `observedGeneration`.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
        existing.observed_generation = observed_generation;
    } else {
        conditions.push(create_condition(
            condition_type,
            status,
            reason,
            message,
            observed_generation,
        ));
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Remove a condition by type, if present.
pub fn clear_condition(conditions: &mut Vec<Condition>, condition_type: &str) {
    conditions.retain(|c| c.r#type != condition_type);
}

/// Compare two condition lists for semantic equality.
///
/// Ignores `lastTransitionTime`; compares type, status, reason, message and
/// `observedGeneration`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    for new_cond in new {
        match current.iter().find(|c| c.r#type == new_cond.r#type) {
            None => return false,
            Some(curr_cond) => {
                if curr_cond.status != new_cond.status
                    || curr_cond.reason != new_cond.reason
                    || curr_cond.message != new_cond.message
                    || curr_cond.observed_generation != new_cond.observed_generation
                {
                    return false;
                }
            }
        }
    }

    true
}

/// Merge a freshly computed condition set into an existing block, keyed by
/// type, preserving transition times for unchanged statuses. Conditions not
/// present in `new` are dropped: blocks represent current state, not history.
#[must_use]
pub fn merge_conditions(existing: &[Condition], new: Vec<Condition>) -> Vec<Condition> {
    let mut merged = existing.to_vec();
    merged.retain(|c| new.iter().any(|n| n.r#type == c.r#type));
    for cond in new {
        update_condition_in_memory(
            &mut merged,
            &cond.r#type,
            &cond.status,
            cond.reason.as_deref().unwrap_or_default(),
            cond.message.as_deref().unwrap_or_default(),
            cond.observed_generation,
        );
    }
    merged
}

/// Which status sections this writer has set during the current pass.
///
/// The parent reconciler and a sub-controller both patch the same observer's
/// status; scoping each patch to the sections its writer actually touched
/// keeps one writer's stale snapshot from reverting the other's fields.
#[derive(Clone, Copy, Debug, Default)]
struct TouchedSections {
    conditions: bool,
    managed_workload: bool,
    primary_route: bool,
    secondary_route: bool,
    observed_generation: bool,
}

impl TouchedSections {
    fn any(self) -> bool {
        self.conditions
            || self.managed_workload
            || self.primary_route
            || self.secondary_route
            || self.observed_generation
    }
}

/// Centralized status updater for `WorkloadObserver` resources.
///
/// Collects all status changes during a reconcile pass and applies them in a
/// single status-subresource patch, preventing the tight reconciliation loop
/// caused by several small status writes each triggering a watch event.
///
/// The patch body contains only the sections set through this updater, so
/// concurrent writers (the parent owns top-level claim conditions,
/// `secondaryRoute` and `observedGeneration`; the sub-controller owns
/// `managedWorkload`, `primaryRoute` and the convergence conditions) cannot
/// clobber each other's fields with snapshot data.
pub struct ObserverStatusUpdater {
    namespace: String,
    name: String,
    generation: Option<i64>,
    current_status: Option<WorkloadObserverStatus>,
    new_status: WorkloadObserverStatus,
    touched: TouchedSections,
}

impl ObserverStatusUpdater {
    /// Create a status updater seeded from the observer's current status.
    #[must_use]
    pub fn new(observer: &WorkloadObserver) -> Self {
        let current_status = observer.status.clone();
        let new_status = current_status.clone().unwrap_or_default();

        Self {
            namespace: observer.namespace().unwrap_or_default(),
            name: observer.name_any(),
            generation: observer.metadata.generation,
            current_status,
            new_status,
            touched: TouchedSections::default(),
        }
    }

    /// Update or add a top-level condition (in-memory only).
    pub fn set_condition(&mut self, condition_type: &str, status: &str, reason: &str, message: &str) {
        self.touched.conditions = true;
        update_condition_in_memory(
            &mut self.new_status.conditions,
            condition_type,
            status,
            reason,
            message,
            self.generation,
        );
    }

    /// Drop a top-level condition entirely (in-memory only).
    pub fn clear_condition(&mut self, condition_type: &str) {
        self.touched.conditions = true;
        clear_condition(&mut self.new_status.conditions, condition_type);
    }

    /// Replace the primary route condition block with a freshly computed set,
    /// preserving transition times for statuses that did not change.
    pub fn set_primary_route_conditions(&mut self, conditions: Vec<Condition>) {
        self.touched.primary_route = true;
        self.new_status.primary_route.conditions =
            merge_conditions(&self.new_status.primary_route.conditions, conditions);
    }

    /// Replace the secondary route condition block.
    pub fn set_secondary_route_conditions(&mut self, conditions: Vec<Condition>) {
        self.touched.secondary_route = true;
        self.new_status.secondary_route.conditions =
            merge_conditions(&self.new_status.secondary_route.conditions, conditions);
    }

    /// Set or clear the detected workload reference (in-memory only).
    ///
    /// Clearing relies on `managedWorkload` serializing as explicit `null`:
    /// a merge patch only removes fields that are present and null.
    pub fn set_managed_workload(&mut self, reference: Option<ManagedReference>) {
        self.touched.managed_workload = true;
        self.new_status.managed_workload = reference;
    }

    /// Record the spec generation this pass processed.
    pub fn set_observed_generation(&mut self) {
        self.touched.observed_generation = true;
        self.new_status.observed_generation = self.generation;
    }

    /// True when a touched section differs semantically from the current one.
    ///
    /// Untouched sections never count: they are absent from the patch body,
    /// so differences there (another writer's work) are not ours to report.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        let Some(current) = &self.current_status else {
            return self.touched.any();
        };

        (self.touched.managed_workload
            && current.managed_workload != self.new_status.managed_workload)
            || (self.touched.observed_generation
                && current.observed_generation != self.new_status.observed_generation)
            || (self.touched.conditions
                && !conditions_equal(&current.conditions, &self.new_status.conditions))
            || (self.touched.primary_route
                && !conditions_equal(
                    &current.primary_route.conditions,
                    &self.new_status.primary_route.conditions,
                ))
            || (self.touched.secondary_route
                && !conditions_equal(
                    &current.secondary_route.conditions,
                    &self.new_status.secondary_route.conditions,
                ))
    }

    /// Build the merge-patch body containing only the touched sections.
    ///
    /// Scoping the body is what keeps the parent reconciler and the
    /// sub-controller from overwriting each other's fields with data from
    /// their own (possibly stale) snapshots of the observer.
    fn patch_body(&self) -> serde_json::Value {
        let mut status = serde_json::Map::new();

        if self.touched.conditions {
            status.insert("conditions".into(), json!(self.new_status.conditions));
        }
        if self.touched.managed_workload {
            status.insert(
                "managedWorkload".into(),
                json!(self.new_status.managed_workload),
            );
        }
        if self.touched.primary_route {
            status.insert("primaryRoute".into(), json!(self.new_status.primary_route));
        }
        if self.touched.secondary_route {
            status.insert(
                "secondaryRoute".into(),
                json!(self.new_status.secondary_route),
            );
        }
        if self.touched.observed_generation {
            status.insert(
                "observedGeneration".into(),
                json!(self.new_status.observed_generation),
            );
        }

        json!({ "status": status })
    }

    /// Conditions collected so far (for tests).
    #[cfg(test)]
    #[must_use]
    pub fn status(&self) -> &WorkloadObserverStatus {
        &self.new_status
    }

    /// Apply the collected changes in one status-subresource patch.
    ///
    /// The patch body carries only the sections touched through this updater.
    /// Skips the API call entirely when nothing changed. A not-found response
    /// is swallowed: the observer was deleted between enqueue and processing.
    ///
    /// # Errors
    ///
    /// Returns an error if the Kubernetes API call fails for any reason other
    /// than the observer no longer existing.
    pub async fn apply(&self, client: &Client) -> Result<()> {
        if !self.has_changes() {
            debug!(
                "WorkloadObserver {}/{} status unchanged, skipping update",
                self.namespace, self.name
            );
            return Ok(());
        }

        let api: Api<WorkloadObserver> = Api::namespaced(client.clone(), &self.namespace);

        let patch = self.patch_body();

        match api
            .patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => {
                debug!(
                    "Updated WorkloadObserver {}/{} status: {} condition(s)",
                    self.namespace,
                    self.name,
                    self.new_status.conditions.len(),
                );
                Ok(())
            }
            Err(e) if crate::errors::is_not_found(&e) => {
                debug!(
                    "WorkloadObserver {}/{} deleted before status update, skipping",
                    self.namespace, self.name
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
