// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Sub-controller construction.
//!
//! [`KubeSubControllerFactory`] builds one `kube::runtime::Controller` per
//! observed workload namespace and spawns it as a detached task. All watch
//! bindings are registered on the builder before the task first polls the
//! streams, so the initial listing cannot be missed:
//!
//! - the owning `WorkloadObserver` itself, field-selected to its name;
//! - the workload custom resource kind, as a `DynamicObject`;
//! - Services carrying the gateway component label;
//! - the CA bundle Secret, field-selected to its name;
//! - Routes in the target namespace.
//!
//! Every watched event maps back to the single observer, funneling through
//! the controller's deduplicating queue. Parent notifications arrive on a
//! bounded channel and trigger the same re-reconciliation path.

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::DynamicObject;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, ResourceExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::OperatorConfig;
use crate::constants::{
    CA_BUNDLE_SECRET_NAME, GATEWAY_SERVICE_LABEL_KEY, GATEWAY_SERVICE_LABEL_VALUE,
    OBSERVER_WATCH_TIMEOUT_SECS, ROUTE_WATCH_TIMEOUT_SECS, SECRET_WATCH_TIMEOUT_SECS,
    SERVICE_WATCH_TIMEOUT_SECS, WORKLOAD_WATCH_TIMEOUT_SECS,
};
use crate::crd::WorkloadObserver;
use crate::errors::OperatorError;
use crate::reconcilers::target::{error_policy_target, reconcile_target, TargetContext};
use crate::registry::SubControllerFactory;
use crate::route_api::Route;

/// Builds real, cluster-backed sub-controllers.
pub struct KubeSubControllerFactory {
    client: Client,
    config: Arc<OperatorConfig>,
}

impl KubeSubControllerFactory {
    /// Create a factory producing sub-controllers on the given client.
    #[must_use]
    pub fn new(client: Client, config: Arc<OperatorConfig>) -> Self {
        Self { client, config }
    }
}

impl SubControllerFactory for KubeSubControllerFactory {
    fn build(
        &self,
        target_namespace: &str,
        observer: &WorkloadObserver,
        notify_rx: mpsc::Receiver<Arc<WorkloadObserver>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, OperatorError> {
        let observer_name = observer.name_any();
        let observer_namespace = observer.namespace().ok_or_else(|| {
            OperatorError::SubControllerConstruction {
                namespace: target_namespace.to_string(),
                reason: "owning observer has no namespace".to_string(),
            }
        })?;

        let observers: Api<WorkloadObserver> =
            Api::namespaced(self.client.clone(), &observer_namespace);
        let observer_watch = watcher::Config::default()
            .fields(&format!("metadata.name={observer_name}"))
            .timeout(OBSERVER_WATCH_TIMEOUT_SECS);

        let routes: Api<Route> = Api::namespaced(self.client.clone(), target_namespace);
        let route_watch = watcher::Config::default().timeout(ROUTE_WATCH_TIMEOUT_SECS);

        let services: Api<Service> = Api::namespaced(self.client.clone(), target_namespace);
        let service_watch = watcher::Config::default()
            .labels(&format!(
                "{GATEWAY_SERVICE_LABEL_KEY}={GATEWAY_SERVICE_LABEL_VALUE}"
            ))
            .timeout(SERVICE_WATCH_TIMEOUT_SECS);

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), target_namespace);
        let secret_watch = watcher::Config::default()
            .fields(&format!("metadata.name={CA_BUNDLE_SECRET_NAME}"))
            .timeout(SECRET_WATCH_TIMEOUT_SECS);

        let workload_resource = self.config.workload_api_resource();
        let workloads: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), target_namespace, &workload_resource);
        let workload_watch = watcher::Config::default().timeout(WORKLOAD_WATCH_TIMEOUT_SECS);

        // Every watched kind maps to the one observer this controller serves.
        let target_ref = ObjectRef::<WorkloadObserver>::new(&observer_name)
            .within(&observer_namespace);
        let map_route = {
            let r = target_ref.clone();
            move |_: Route| Some(r.clone())
        };
        let map_service = {
            let r = target_ref.clone();
            move |_: Service| Some(r.clone())
        };
        let map_secret = {
            let r = target_ref.clone();
            move |_: Secret| Some(r.clone())
        };
        let map_workload = {
            let r = target_ref.clone();
            move |_: DynamicObject| Some(r.clone())
        };

        let notify_stream = futures::stream::unfold(notify_rx, |mut rx| async move {
            rx.recv().await.map(|_| ((), rx))
        });

        let mut shutdown_rx = shutdown_rx;
        let shutdown_signal = async move {
            // A dropped sender counts as a shutdown request too.
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };

        let context = Arc::new(TargetContext {
            client: self.client.clone(),
            config: self.config.clone(),
            target_namespace: target_namespace.to_string(),
        });

        let namespace = target_namespace.to_string();
        let controller = Controller::new(observers, observer_watch)
            .watches(routes, route_watch, map_route)
            .watches(services, service_watch, map_service)
            .watches(secrets, secret_watch, map_secret)
            .watches_with(workloads, workload_resource, workload_watch, map_workload)
            .reconcile_all_on(notify_stream)
            .graceful_shutdown_on(shutdown_signal);

        let join = tokio::spawn(async move {
            info!("Sub-controller for namespace {namespace} starting");
            controller
                .run(reconcile_target, error_policy_target, context)
                .for_each(|result| async {
                    match result {
                        Ok((obj, _)) => debug!("Reconciled {obj:?}"),
                        Err(e) => debug!("Reconcile dispatch error: {e}"),
                    }
                })
                .await;
            info!("Sub-controller for namespace {namespace} stopped");
        });

        Ok(join)
    }
}
