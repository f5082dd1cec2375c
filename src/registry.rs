// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller registry: process-wide ownership of running sub-controllers.
//!
//! One mutex guards both the sub-controller map and the workload-namespace
//! claim table. Every mutation (`ensure`, `stop`, `notify`, `claim`,
//! `release`) goes through that mutex and performs no awaits while holding
//! it, which gives the two guarantees the rest of the crate relies on:
//!
//! - a `notify` can never observe a half-stopped sub-controller, because
//!   `stop` removes the handle (closing the notification channel) under the
//!   same lock a `notify` must take to reach the sender;
//! - two concurrent reconciles for the same observer cannot double-start a
//!   sub-controller.
//!
//! Handles are process-local state, not persisted anywhere; after a restart
//! the parent reconciler rebuilds them from the observers it lists.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::NOTIFY_CHANNEL_CAPACITY;
use crate::crd::WorkloadObserver;
use crate::errors::OperatorError;
use crate::metrics;

/// Handle to one running sub-controller.
pub struct SubControllerHandle {
    /// Namespace this sub-controller observes.
    pub target_namespace: String,
    notify_tx: mpsc::Sender<Arc<WorkloadObserver>>,
    shutdown_tx: watch::Sender<bool>,
    #[allow(dead_code)]
    join: JoinHandle<()>,
}

/// Builds and spawns sub-controllers.
///
/// Construction is synchronous by design: the registry calls `build` while
/// holding its mutex, so the factory must not block or await. Registering
/// watches on a controller builder and spawning its future satisfies this;
/// the watch streams start when the spawned task polls them.
pub trait SubControllerFactory: Send + Sync {
    /// Build a sub-controller for `target_namespace` and spawn it.
    ///
    /// All watch bindings must be registered before the returned task starts
    /// consuming events, so the initial listing cannot be missed.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError::SubControllerConstruction`] when the
    /// controller cannot be built. The failure is local to this attempt; the
    /// parent reconciler retries on its next pass.
    fn build(
        &self,
        target_namespace: &str,
        observer: &WorkloadObserver,
        notify_rx: mpsc::Receiver<Arc<WorkloadObserver>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, OperatorError>;
}

/// Outcome of a workload-namespace claim attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The namespace was unclaimed; the caller now owns it.
    Granted,
    /// The caller already owns this namespace.
    AlreadyOwner,
    /// Another observer holds the claim. First claim wins.
    Refused {
        /// `namespace/name` key of the observer holding the claim.
        holder: String,
    },
}

struct Inner {
    controllers: HashMap<String, SubControllerHandle>,
    claims: HashMap<String, String>,
}

/// Serialized map of target namespace to running sub-controller, plus the
/// first-claim-wins claim table.
pub struct ControllerRegistry {
    factory: Arc<dyn SubControllerFactory>,
    inner: Mutex<Inner>,
}

impl ControllerRegistry {
    /// Create an empty registry backed by the given factory.
    #[must_use]
    pub fn new(factory: Arc<dyn SubControllerFactory>) -> Self {
        Self {
            factory,
            inner: Mutex::new(Inner {
                controllers: HashMap::new(),
                claims: HashMap::new(),
            }),
        }
    }

    /// Attempt to claim `target_namespace` for `observer_key`.
    pub fn claim(&self, target_namespace: &str, observer_key: &str) -> ClaimOutcome {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        match inner.claims.get(target_namespace) {
            Some(holder) if holder == observer_key => ClaimOutcome::AlreadyOwner,
            Some(holder) => {
                metrics::record_claim_conflict(target_namespace);
                ClaimOutcome::Refused {
                    holder: holder.clone(),
                }
            }
            None => {
                inner
                    .claims
                    .insert(target_namespace.to_string(), observer_key.to_string());
                info!("Observer {observer_key} claimed workload namespace {target_namespace}");
                ClaimOutcome::Granted
            }
        }
    }

    /// The observer key currently holding the claim on `target_namespace`.
    #[must_use]
    pub fn claim_holder(&self, target_namespace: &str) -> Option<String> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.claims.get(target_namespace).cloned()
    }

    /// The namespace currently claimed by `observer_key`, if any. Used to
    /// detect retargeting: a spec edit pointing the observer at a different
    /// namespace must release and stop the previous one.
    #[must_use]
    pub fn claimed_namespace_of(&self, observer_key: &str) -> Option<String> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .claims
            .iter()
            .find(|(_, holder)| holder.as_str() == observer_key)
            .map(|(ns, _)| ns.clone())
    }

    /// Release any claim held by `observer_key` and return the namespace it
    /// covered. Used on observer deletion and on retargeting.
    pub fn release(&self, observer_key: &str) -> Option<String> {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        let namespace = inner
            .claims
            .iter()
            .find(|(_, holder)| holder.as_str() == observer_key)
            .map(|(ns, _)| ns.clone())?;
        inner.claims.remove(&namespace);
        info!("Observer {observer_key} released workload namespace {namespace}");
        Some(namespace)
    }

    /// Start a sub-controller for `target_namespace` if none is running.
    ///
    /// Idempotent: returns `Ok(false)` when one already exists.
    ///
    /// # Errors
    ///
    /// Propagates the factory's construction error; no partial handle is
    /// registered in that case.
    pub fn ensure(
        &self,
        target_namespace: &str,
        observer: &WorkloadObserver,
    ) -> Result<bool, OperatorError> {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        if inner.controllers.contains_key(target_namespace) {
            return Ok(false);
        }

        let (notify_tx, notify_rx) = mpsc::channel(NOTIFY_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let join = self
            .factory
            .build(target_namespace, observer, notify_rx, shutdown_rx)?;

        inner.controllers.insert(
            target_namespace.to_string(),
            SubControllerHandle {
                target_namespace: target_namespace.to_string(),
                notify_tx,
                shutdown_tx,
                join,
            },
        );
        metrics::adjust_subcontrollers_active(1.0);
        info!("Started sub-controller for namespace {target_namespace}");
        Ok(true)
    }

    /// Stop the sub-controller for `target_namespace`, if any.
    ///
    /// Idempotent: stopping an absent or already-stopped entry is a no-op.
    /// Dropping the handle closes the notification channel exactly once; the
    /// shutdown signal lets in-flight reconciliation finish before the task
    /// exits.
    pub fn stop(&self, target_namespace: &str) -> bool {
        let removed = {
            let mut inner = self.inner.lock().expect("registry mutex poisoned");
            inner.controllers.remove(target_namespace)
        };

        match removed {
            Some(handle) => {
                // Receiver may already be gone if the task finished on its own.
                let _ = handle.shutdown_tx.send(true);
                metrics::adjust_subcontrollers_active(-1.0);
                info!("Stopped sub-controller for namespace {target_namespace}");
                true
            }
            None => {
                debug!("No sub-controller running for namespace {target_namespace}, nothing to stop");
                false
            }
        }
    }

    /// Nudge the sub-controller for `target_namespace` to re-reconcile.
    ///
    /// Non-blocking. A full buffer drops the notification: reconciliation
    /// re-reads cluster state, and a full buffer means a wakeup is already
    /// pending. A closed channel can only mean the task exited on its own,
    /// since `stop` removes the sender under the same lock held here.
    pub fn notify(&self, target_namespace: &str, observer: Arc<WorkloadObserver>) {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        let Some(handle) = inner.controllers.get(target_namespace) else {
            debug!("No sub-controller for namespace {target_namespace}, notification skipped");
            return;
        };

        match handle.notify_tx.try_send(observer) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::record_notification_dropped("buffer_full");
                warn!(
                    "Notification buffer for namespace {target_namespace} is full, \
                     dropping (a wakeup is already pending)"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                metrics::record_notification_dropped("closed");
                warn!(
                    "Sub-controller for namespace {target_namespace} exited, \
                     notification dropped"
                );
            }
        }
    }

    /// Whether a sub-controller is currently registered for the namespace.
    #[must_use]
    pub fn is_running(&self, target_namespace: &str) -> bool {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.controllers.contains_key(target_namespace)
    }

    /// Number of running sub-controllers.
    #[must_use]
    pub fn active_count(&self) -> usize {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.controllers.len()
    }

    /// Stop every sub-controller. Called on operator shutdown.
    pub fn shutdown_all(&self) {
        let handles: Vec<SubControllerHandle> = {
            let mut inner = self.inner.lock().expect("registry mutex poisoned");
            inner.controllers.drain().map(|(_, h)| h).collect()
        };

        for handle in &handles {
            let _ = handle.shutdown_tx.send(true);
            metrics::adjust_subcontrollers_active(-1.0);
        }
        if !handles.is_empty() {
            info!("Stopped {} sub-controller(s) on shutdown", handles.len());
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
