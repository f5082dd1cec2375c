// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context passed to the parent reconciler.

use std::sync::Arc;

use kube::Client;

use crate::config::OperatorConfig;
use crate::registry::ControllerRegistry;

/// Context shared across parent reconcile invocations.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes API client.
    pub client: Client,
    /// Process configuration.
    pub config: Arc<OperatorConfig>,
    /// Registry of running sub-controllers and namespace claims.
    pub registry: Arc<ControllerRegistry>,
}

impl Context {
    /// Create a new shared context.
    #[must_use]
    pub fn new(
        client: Client,
        config: Arc<OperatorConfig>,
        registry: Arc<ControllerRegistry>,
    ) -> Self {
        Self {
            client,
            config,
            registry,
        }
    }
}
