// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use super::*;
use crate::crd::{RouteManagementSpec, WorkloadObserverSpec};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Factory whose sub-controllers just drain notifications until shutdown.
struct FakeFactory {
    builds: AtomicUsize,
    fail: bool,
}

impl FakeFactory {
    fn new() -> Self {
        Self {
            builds: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            builds: AtomicUsize::new(0),
            fail: true,
        }
    }
}

impl SubControllerFactory for FakeFactory {
    fn build(
        &self,
        target_namespace: &str,
        _observer: &WorkloadObserver,
        mut notify_rx: mpsc::Receiver<Arc<WorkloadObserver>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, OperatorError> {
        if self.fail {
            return Err(OperatorError::SubControllerConstruction {
                namespace: target_namespace.to_string(),
                reason: "synthetic failure".to_string(),
            });
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = notify_rx.recv() => {
                        if msg.is_none() {
                            break;
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        }))
    }
}

fn observer(name: &str, target: &str) -> WorkloadObserver {
    let mut obs = WorkloadObserver::new(
        name,
        WorkloadObserverSpec {
            target_namespace: target.to_string(),
            bridge_namespace: "bridge-ns".to_string(),
            primary_route: RouteManagementSpec::default(),
            secondary_route: RouteManagementSpec::default(),
        },
    );
    obs.metadata.namespace = Some("op-ns".to_string());
    obs
}

#[tokio::test]
async fn ensure_is_idempotent() {
    let factory = Arc::new(FakeFactory::new());
    let registry = ControllerRegistry::new(factory.clone());
    let obs = observer("a", "ns-1");

    assert!(registry.ensure("ns-1", &obs).unwrap());
    assert!(!registry.ensure("ns-1", &obs).unwrap());
    assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    assert_eq!(registry.active_count(), 1);

    registry.shutdown_all();
}

#[tokio::test]
async fn stop_is_idempotent_and_safe_when_absent() {
    let registry = ControllerRegistry::new(Arc::new(FakeFactory::new()));
    let obs = observer("a", "ns-1");

    assert!(!registry.stop("ns-1"), "nothing running yet");
    registry.ensure("ns-1", &obs).unwrap();
    assert!(registry.stop("ns-1"));
    assert!(!registry.stop("ns-1"), "second stop is a no-op");
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn notify_after_stop_does_not_panic() {
    let registry = ControllerRegistry::new(Arc::new(FakeFactory::new()));
    let obs = Arc::new(observer("a", "ns-1"));

    registry.ensure("ns-1", &obs).unwrap();
    registry.stop("ns-1");
    // Handle is gone; the notification is silently skipped.
    registry.notify("ns-1", obs.clone());
    registry.notify("never-existed", obs);
}

#[tokio::test]
async fn notifications_reach_a_running_subcontroller() {
    let registry = ControllerRegistry::new(Arc::new(FakeFactory::new()));
    let obs = Arc::new(observer("a", "ns-1"));

    registry.ensure("ns-1", &obs).unwrap();
    for _ in 0..10 {
        // More sends than the buffer holds; overflow drops, never blocks.
        registry.notify("ns-1", obs.clone());
    }
    registry.shutdown_all();
}

#[tokio::test]
async fn construction_failure_registers_nothing() {
    let registry = ControllerRegistry::new(Arc::new(FakeFactory::failing()));
    let obs = observer("a", "ns-1");

    assert!(registry.ensure("ns-1", &obs).is_err());
    assert!(!registry.is_running("ns-1"));
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn first_claim_wins() {
    let registry = ControllerRegistry::new(Arc::new(FakeFactory::new()));

    assert_eq!(registry.claim("ns-1", "op-ns/a"), ClaimOutcome::Granted);
    assert_eq!(registry.claim("ns-1", "op-ns/a"), ClaimOutcome::AlreadyOwner);
    assert_eq!(
        registry.claim("ns-1", "op-ns/b"),
        ClaimOutcome::Refused {
            holder: "op-ns/a".to_string()
        }
    );
    assert_eq!(registry.claim_holder("ns-1").as_deref(), Some("op-ns/a"));
}

#[tokio::test]
async fn release_frees_the_namespace_for_the_next_claimant() {
    let registry = ControllerRegistry::new(Arc::new(FakeFactory::new()));

    registry.claim("ns-1", "op-ns/a");
    assert_eq!(registry.release("op-ns/a").as_deref(), Some("ns-1"));
    assert_eq!(registry.release("op-ns/a"), None, "second release is a no-op");
    assert_eq!(registry.claim("ns-1", "op-ns/b"), ClaimOutcome::Granted);
}

#[tokio::test]
async fn claimed_namespace_of_reports_current_target() {
    let registry = ControllerRegistry::new(Arc::new(FakeFactory::new()));

    assert_eq!(registry.claimed_namespace_of("op-ns/a"), None);
    registry.claim("ns-1", "op-ns/a");
    assert_eq!(
        registry.claimed_namespace_of("op-ns/a").as_deref(),
        Some("ns-1")
    );
}

#[tokio::test]
async fn independent_namespaces_do_not_interfere() {
    let factory = Arc::new(FakeFactory::new());
    let registry = ControllerRegistry::new(factory.clone());
    let a = observer("a", "ns-a");
    let b = observer("b", "ns-b");

    registry.ensure("ns-a", &a).unwrap();
    registry.ensure("ns-b", &b).unwrap();
    assert_eq!(registry.active_count(), 2);

    registry.stop("ns-a");
    assert!(!registry.is_running("ns-a"));
    assert!(registry.is_running("ns-b"), "stopping ns-a must not touch ns-b");

    registry.notify("ns-b", Arc::new(b));
    registry.shutdown_all();
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn shutdown_all_stops_everything() {
    let registry = ControllerRegistry::new(Arc::new(FakeFactory::new()));
    registry.ensure("ns-a", &observer("a", "ns-a")).unwrap();
    registry.ensure("ns-b", &observer("b", "ns-b")).unwrap();

    registry.shutdown_all();
    assert_eq!(registry.active_count(), 0);
    // Safe to call again with nothing running.
    registry.shutdown_all();
}
