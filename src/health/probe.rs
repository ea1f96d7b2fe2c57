//! Connectivity probing.
//!
//! # Responsibilities
//! - Run a trivial round trip against the pool with bounded retries
//! - Recreate the pool between failed attempts
//! - Record every outcome in the availability state
//!
//! # Design Decisions
//! - A pool that failed an attempt is assumed poisoned and replaced
//! - This is the only writer of `AvailabilityState`

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::db::PoolManager;
use crate::health::state::AvailabilityState;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

pub struct ConnectivityProbe {
    pool: Arc<PoolManager>,
    availability: Arc<AvailabilityState>,
}

impl ConnectivityProbe {
    pub fn new(pool: Arc<PoolManager>, availability: Arc<AvailabilityState>) -> Self {
        Self { pool, availability }
    }

    pub fn availability(&self) -> &Arc<AvailabilityState> {
        &self.availability
    }

    pub async fn probe_with(&self, policy: RetryPolicy) -> bool {
        self.probe(policy.max_attempts, policy.delay).await
    }

    /// Probe the store up to `max_attempts` times, waiting `delay` and
    /// recreating the pool between attempts.
    ///
    /// Returns true on the first success. The outcome is always written to
    /// the availability state.
    pub async fn probe(&self, max_attempts: u32, delay: Duration) -> bool {
        let policy = RetryPolicy::new(max_attempts, delay);
        let started = Instant::now();

        if let Err(e) = self.pool.ensure_pool().await {
            tracing::warn!(error = %e, "No database pool available before probing");
        }

        for attempt in 1..=policy.max_attempts {
            match self.pool.ping().await {
                Ok(()) => {
                    tracing::info!(attempt, "Database connection verified");
                    metrics::record_probe(true, attempt, started);
                    self.availability.record(true);
                    return true;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "Database probe attempt failed"
                    );
                    if policy.has_next(attempt) {
                        tokio::time::sleep(policy.delay).await;
                        if let Err(e) = self.pool.create_pool().await {
                            tracing::warn!(error = %e, "Pool recreation before retry failed");
                        }
                    }
                }
            }
        }

        tracing::error!(attempts = policy.max_attempts, "All database connection attempts failed");
        metrics::record_probe(false, policy.max_attempts, started);
        self.availability.record(false);
        false
    }
}
