//! Retry policy.
//!
//! # Responsibilities
//! - Bound the number of attempts a probe makes
//! - Fix the wait between attempts
//!
//! # Design Decisions
//! - Fixed delay, no jitter: a single process probes a single store
//! - Zero attempts is clamped to one so a probe always runs

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// One attempt, no waiting. Used for the gate's cheap re-check.
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Whether another attempt follows `attempt` (1-based).
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}
