// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error taxonomy for reconciliation.
//!
//! Every failure a reconciler can hit falls into one of four buckets, and
//! each bucket has a fixed requeue behavior:
//!
//! - **Not-found** - the object was deleted between enqueue and processing.
//!   A valid terminal state, not an error; absorbed, no requeue.
//! - **Conflict** - optimistic-lock failure (HTTP 409). Transient; retried
//!   immediately without growing the backoff.
//! - **Transient** - API server throttling, timeouts, transport failures.
//!   Retried with exponential backoff.
//! - **Policy violation** - the declared state cannot currently be achieved
//!   (e.g. a route refused admission). Surfaced as a `Degraded=True`
//!   condition on the owning resource and still requeued, since the cause
//!   may self-resolve.
//!
//! Nothing in this crate terminates the process over a reconcile error.

use thiserror::Error;

/// Errors surfaced by routewatch reconcilers.
#[derive(Error, Debug)]
pub enum OperatorError {
    /// A sub-controller could not be constructed.
    ///
    /// Fatal to that creation attempt only; the parent reconciler retries
    /// on its next pass.
    #[error("failed to construct sub-controller for namespace '{namespace}': {reason}")]
    SubControllerConstruction {
        /// Target namespace the sub-controller was meant to observe.
        namespace: String,
        /// Why construction failed.
        reason: String,
    },

    /// The observer spec is unusable (e.g. empty target namespace slipped
    /// past schema validation).
    #[error("invalid observer spec for '{observer}': {reason}")]
    InvalidSpec {
        /// The `namespace/name` key of the offending observer.
        observer: String,
        /// What is invalid.
        reason: String,
    },
}

/// Classification of an error for requeue purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Object deleted concurrently; terminal, no requeue.
    NotFound,
    /// Optimistic-concurrency conflict; requeue immediately.
    Conflict,
    /// Throttling, timeout or transport failure; requeue with backoff.
    Transient,
    /// Permanent client-side error; requeue with backoff after surfacing
    /// a Degraded condition.
    Permanent,
}

/// Classify a `kube::Error` into the taxonomy above.
#[must_use]
pub fn classify(err: &kube::Error) -> ErrorKind {
    match err {
        kube::Error::Api(api_err) => match api_err.code {
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::Transient,
            code if (500..600).contains(&code) => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        },
        // Network/connection errors are transient by definition.
        kube::Error::Service(_) => ErrorKind::Transient,
        _ => ErrorKind::Permanent,
    }
}

/// True when the error only means the object no longer exists.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    classify(err) == ErrorKind::NotFound
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
