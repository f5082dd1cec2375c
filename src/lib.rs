// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! routewatch: a Kubernetes operator exposing workload namespaces via routes.
//!
//! A parent controller watches `WorkloadObserver` resources. Each observer
//! names a workload namespace; the operator claims that namespace
//! (first-claim-wins), spawns a dedicated sub-controller scoped to it at
//! runtime, and converges the routes exposing the workload's gateway service
//! and the companion bridge service. Observers can be created, retargeted
//! and deleted without restarting the process.
//!
//! # Architecture
//!
//! - [`crd`] / [`route_api`] - resource types
//! - [`registry`] - serialized sub-controller lifecycle and namespace claims
//! - [`subcontroller`] - per-namespace controller construction
//! - [`reconcilers`] - parent and sub-controller reconcile logic, the pure
//!   route policy, status and finalizer plumbing
//! - [`errors`] - error taxonomy driving requeue behavior
//! - [`metrics`] / [`server`] - Prometheus metrics and health probes

pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod metrics;
pub mod reconcilers;
pub mod registry;
pub mod route_api;
pub mod server;
pub mod subcontroller;
