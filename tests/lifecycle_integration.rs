// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle tests for the controller registry with an in-memory
//! reconciliation engine: sub-controllers that record the notifications they
//! receive instead of talking to a cluster.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use routewatch::crd::{RouteManagementSpec, WorkloadObserver, WorkloadObserverSpec};
use routewatch::errors::OperatorError;
use routewatch::registry::{ClaimOutcome, ControllerRegistry, SubControllerFactory};

/// Records every notification each spawned sub-controller receives, and how
/// many sub-controllers have fully exited.
struct RecordingFactory {
    notifications: Arc<Mutex<Vec<(String, String)>>>,
    exited: Arc<AtomicUsize>,
}

impl RecordingFactory {
    fn new() -> Self {
        Self {
            notifications: Arc::new(Mutex::new(Vec::new())),
            exited: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SubControllerFactory for RecordingFactory {
    fn build(
        &self,
        target_namespace: &str,
        _observer: &WorkloadObserver,
        mut notify_rx: mpsc::Receiver<Arc<WorkloadObserver>>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, OperatorError> {
        let namespace = target_namespace.to_string();
        let notifications = self.notifications.clone();
        let exited = self.exited.clone();

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = notify_rx.recv() => {
                        match msg {
                            Some(observer) => {
                                notifications
                                    .lock()
                                    .unwrap()
                                    .push((namespace.clone(), observer.observer_key()));
                            }
                            None => break,
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            exited.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

fn observer(name: &str, target: &str) -> Arc<WorkloadObserver> {
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
    Arc::new(obs)
}

async fn settle() {
    // Give spawned tasks a chance to drain their channels.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn notifications_are_delivered_to_the_right_subcontroller() {
    let factory = Arc::new(RecordingFactory::new());
    let notifications = factory.notifications.clone();
    let registry = ControllerRegistry::new(factory);

    let a = observer("a", "ns-a");
    let b = observer("b", "ns-b");
    registry.ensure("ns-a", &a).unwrap();
    registry.ensure("ns-b", &b).unwrap();

    registry.notify("ns-a", a.clone());
    registry.notify("ns-b", b.clone());
    registry.notify("ns-a", a.clone());
    settle().await;

    let seen = notifications.lock().unwrap().clone();
    let to_a = seen.iter().filter(|(ns, _)| ns == "ns-a").count();
    let to_b = seen.iter().filter(|(ns, _)| ns == "ns-b").count();
    assert_eq!(to_a, 2);
    assert_eq!(to_b, 1);
    assert!(seen
        .iter()
        .all(|(ns, key)| (ns == "ns-a") == (key == "op-ns/a")));

    registry.shutdown_all();
}

#[tokio::test]
async fn stopping_one_namespace_leaves_the_other_running() {
    let factory = Arc::new(RecordingFactory::new());
    let exited = factory.exited.clone();
    let notifications = factory.notifications.clone();
    let registry = ControllerRegistry::new(factory);

    let a = observer("a", "ns-a");
    let b = observer("b", "ns-b");
    registry.ensure("ns-a", &a).unwrap();
    registry.ensure("ns-b", &b).unwrap();

    registry.stop("ns-a");
    settle().await;
    assert_eq!(exited.load(Ordering::SeqCst), 1, "ns-a task must exit");
    assert!(registry.is_running("ns-b"));

    registry.notify("ns-b", b.clone());
    settle().await;
    assert!(notifications
        .lock()
        .unwrap()
        .iter()
        .any(|(ns, _)| ns == "ns-b"));

    registry.shutdown_all();
    settle().await;
    assert_eq!(exited.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn graceful_shutdown_reaches_every_subcontroller() {
    let factory = Arc::new(RecordingFactory::new());
    let exited = factory.exited.clone();
    let registry = ControllerRegistry::new(factory);

    for ns in ["ns-a", "ns-b", "ns-c"] {
        registry.ensure(ns, &observer(ns, ns)).unwrap();
    }
    assert_eq!(registry.active_count(), 3);

    registry.shutdown_all();
    settle().await;
    assert_eq!(exited.load(Ordering::SeqCst), 3);
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn claim_exclusivity_holds_across_the_lifecycle() {
    let factory = Arc::new(RecordingFactory::new());
    let registry = ControllerRegistry::new(factory);

    let a = observer("a", "contested-ns");
    let b = observer("b", "contested-ns");

    assert_eq!(
        registry.claim("contested-ns", &a.observer_key()),
        ClaimOutcome::Granted
    );
    assert_eq!(
        registry.claim("contested-ns", &b.observer_key()),
        ClaimOutcome::Refused {
            holder: "op-ns/a".to_string()
        }
    );

    // Winner starts the sub-controller; exactly one runs for the namespace.
    registry.ensure("contested-ns", &a).unwrap();
    assert!(!registry.ensure("contested-ns", &b).unwrap());
    assert_eq!(registry.active_count(), 1);

    // Winner goes away; the standby's next claim succeeds.
    registry.release(&a.observer_key());
    registry.stop("contested-ns");
    assert_eq!(
        registry.claim("contested-ns", &b.observer_key()),
        ClaimOutcome::Granted
    );

    registry.shutdown_all();
}

#[tokio::test]
async fn overflowing_notifications_never_block_the_caller() {
    let factory = Arc::new(RecordingFactory::new());
    let registry = ControllerRegistry::new(factory);
    let a = observer("a", "ns-a");
    registry.ensure("ns-a", &a).unwrap();

    // Far more sends than the buffer holds; must return promptly every time.
    for _ in 0..100 {
        registry.notify("ns-a", a.clone());
    }

    registry.shutdown_all();
}

#[tokio::test]
async fn notify_after_stop_is_dropped_not_sent() {
    let factory = Arc::new(RecordingFactory::new());
    let notifications = factory.notifications.clone();
    let registry = ControllerRegistry::new(factory);
    let a = observer("a", "ns-a");

    registry.ensure("ns-a", &a).unwrap();
    registry.stop("ns-a");
    settle().await;

    registry.notify("ns-a", a.clone());
    settle().await;
    assert!(notifications.lock().unwrap().is_empty());
}

#[tokio::test]
async fn restart_after_stop_builds_a_fresh_subcontroller() {
    let factory = Arc::new(RecordingFactory::new());
    let notifications = factory.notifications.clone();
    let registry = ControllerRegistry::new(factory);
    let a = observer("a", "ns-a");

    registry.ensure("ns-a", &a).unwrap();
    registry.stop("ns-a");
    assert!(registry.ensure("ns-a", &a).unwrap(), "restart builds anew");

    registry.notify("ns-a", a.clone());
    settle().await;
    assert_eq!(notifications.lock().unwrap().len(), 1);

    registry.shutdown_all();
}
