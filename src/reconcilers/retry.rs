// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry helpers for Kubernetes API operations.
//!
//! Retry behavior follows the error taxonomy in [`crate::errors`]:
//!
//! - conflicts (HTTP 409) retry immediately and do not consume a backoff
//!   step, since the very next read observes the new resourceVersion;
//! - throttling (429), server errors (5xx) and transport failures retry
//!   with exponential backoff and jitter;
//! - everything else fails fast and is surfaced to the caller.

use rand::RngExt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{classify, ErrorKind};

/// Exponential backoff schedule with jitter.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each attempt.
    pub multiplier: f64,
    /// Attempts before giving up (not counting immediate conflict retries).
    pub max_attempts: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

impl ExponentialBackoff {
    /// Delay for the given zero-based attempt, with up to 20% random jitter
    /// so synchronized retries from parallel reconciles spread out.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        let jitter = rand::rng().random_range(0.0..capped * 0.2);
        Duration::from_secs_f64(capped + jitter)
    }
}

/// Run a Kubernetes API operation, retrying per the error taxonomy.
///
/// `description` names the operation in logs, e.g. `"replace route gateway"`.
///
/// # Errors
///
/// Returns the last error once `max_attempts` transient failures have been
/// consumed, or the first error that is neither a conflict nor transient.
pub async fn retry_api_operation<T, F, Fut>(
    description: &str,
    backoff: &ExponentialBackoff,
    mut operation: F,
) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let mut attempt: u32 = 0;
    // Conflicts retry without consuming an attempt, but not forever.
    let mut conflict_retries: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => match classify(&err) {
                ErrorKind::Conflict if conflict_retries < backoff.max_attempts => {
                    conflict_retries += 1;
                    debug!(
                        "{description}: conflict (resourceVersion changed), retrying immediately \
                         ({conflict_retries}/{})",
                        backoff.max_attempts
                    );
                }
                ErrorKind::Transient if attempt + 1 < backoff.max_attempts => {
                    let delay = backoff.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        "{description}: transient error, retrying in {delay:?} \
                         (attempt {attempt}/{}): {err}",
                        backoff.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(err),
            },
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
