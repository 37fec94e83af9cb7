//! Ranked failover routing
//!
//! The router walks a descriptor's targets in order. A failure the caller
//! classifies as retryable moves on to the next target after a backoff;
//! anything else is returned immediately. The descriptor itself is only read,
//! so the preference order stays intact until a new view replaces it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

use beanstore_core::{MemberId, RetryConfig};

use crate::cookie::parse_routes;
use crate::descriptor::AffinityDescriptor;
use crate::error::AffinityError;
use crate::route::RouteRegistry;

/// Invokes operations against the members a descriptor prefers.
#[derive(Debug)]
pub struct AffinityRouter {
    routes: Arc<RouteRegistry>,
    retry: RetryConfig,
    /// Attempts that moved past a failed member (observational)
    failovers: AtomicU64,
}

impl AffinityRouter {
    /// Create a router
    pub fn new(routes: Arc<RouteRegistry>, retry: RetryConfig) -> Self {
        AffinityRouter {
            routes,
            retry,
            failovers: AtomicU64::new(0),
        }
    }

    /// Retry settings
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Number of failovers performed so far
    pub fn failovers(&self) -> u64 {
        self.failovers.load(Ordering::Relaxed)
    }

    /// Members to try, in order. Cookie tokens that map to no known member
    /// are skipped.
    pub fn targets(&self, descriptor: &AffinityDescriptor) -> Vec<MemberId> {
        match descriptor {
            AffinityDescriptor::SingleOwner(_) | AffinityDescriptor::RankedList(_) => {
                descriptor.members().to_vec()
            }
            AffinityDescriptor::Cookie { value, .. } => {
                let mut targets: Vec<MemberId> = Vec::new();
                for route in parse_routes(value).unwrap_or_default() {
                    if let Some(member) = self.routes.member_for_route(&route) {
                        if !targets.contains(&member) {
                            targets.push(member);
                        }
                    }
                }
                targets
            }
        }
    }

    /// Run `op` against the preferred member, failing over in order.
    ///
    /// At most `max_retries + 1` members are tried. Returns the first
    /// success, the first non-retryable error, or the last error once the
    /// targets or retries run out.
    ///
    /// # Errors
    ///
    /// `AffinityError::NoTargets` (converted into `E`) if the descriptor
    /// names no routable member.
    pub fn invoke<T, E, F, R>(
        &self,
        descriptor: &AffinityDescriptor,
        mut op: F,
        is_retryable: R,
    ) -> Result<T, E>
    where
        F: FnMut(&MemberId) -> Result<T, E>,
        R: Fn(&E) -> bool,
        E: From<AffinityError> + std::fmt::Display,
    {
        let targets = self.targets(descriptor);
        if targets.is_empty() {
            return Err(AffinityError::NoTargets(descriptor.to_string()).into());
        }
        let attempts = targets.len().min(self.retry.max_retries.saturating_add(1));

        let mut last_error = None;
        for (attempt, member) in targets.iter().take(attempts).enumerate() {
            if attempt > 0 {
                self.failovers.fetch_add(1, Ordering::Relaxed);
                thread::sleep(self.retry.calculate_delay(attempt - 1));
            }
            match op(member) {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(target: "beanstore::affinity", member = %member, attempt, "Failover succeeded");
                    }
                    return Ok(value);
                }
                Err(e) if is_retryable(&e) => {
                    warn!(target: "beanstore::affinity", member = %member, error = %e, "Member failed, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| AffinityError::NoTargets(descriptor.to_string()).into()))
    }
}
