//! Process-wide database availability flag.
//!
//! # States
//! - Unknown: no probe has completed yet (process start)
//! - Up: the most recent probe against the current pool succeeded
//! - Down: the most recent probe failed
//!
//! # State Transitions
//! ```text
//! Unknown → Up | Down: first probe
//! Up ↔ Down: probe outcome changes
//! ```
//!
//! # Design Decisions
//! - Lock-free reads on the request path (atomic u8)
//! - Last writer wins; no ordering against concurrent admissions
//! - Every write is published on a watch channel for the reconnect loop

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::observability::metrics;

/// Availability state enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Unknown = 0,
    Up = 1,
    Down = 2,
}

impl From<u8> for Availability {
    fn from(val: u8) -> Self {
        match val {
            1 => Availability::Up,
            2 => Availability::Down,
            _ => Availability::Unknown,
        }
    }
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Unknown => "unknown",
            Availability::Up => "up",
            Availability::Down => "down",
        }
    }
}

/// Serializable view used by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilitySnapshot {
    pub state: Availability,
    pub changed_at: Option<DateTime<Utc>>,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct AvailabilityState {
    state: AtomicU8,
    /// Unix millis of the last transition, 0 when none happened.
    changed_at_ms: AtomicI64,
    /// Unix millis of the last probe write, 0 when none happened.
    checked_at_ms: AtomicI64,
    updates: watch::Sender<Availability>,
}

impl AvailabilityState {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(Availability::Unknown);
        Self {
            state: AtomicU8::new(Availability::Unknown as u8),
            changed_at_ms: AtomicI64::new(0),
            checked_at_ms: AtomicI64::new(0),
            updates,
        }
    }

    pub fn current(&self) -> Availability {
        Availability::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_up(&self) -> bool {
        self.current() == Availability::Up
    }

    /// Store a probe outcome and return the previous state.
    pub fn record(&self, up: bool) -> Availability {
        let next = if up { Availability::Up } else { Availability::Down };
        let now = Utc::now().timestamp_millis();

        let previous = Availability::from(self.state.swap(next as u8, Ordering::AcqRel));
        self.checked_at_ms.store(now, Ordering::Release);

        if previous != next {
            self.changed_at_ms.store(now, Ordering::Release);
            tracing::info!(
                from = previous.as_str(),
                to = next.as_str(),
                "Database availability changed"
            );
            metrics::set_availability(next);
        }

        self.updates.send_replace(next);
        previous
    }

    /// Receiver notified on every probe write, changed or not.
    pub fn subscribe(&self) -> watch::Receiver<Availability> {
        self.updates.subscribe()
    }

    pub fn changed_at(&self) -> Option<DateTime<Utc>> {
        millis_to_time(self.changed_at_ms.load(Ordering::Acquire))
    }

    pub fn checked_at(&self) -> Option<DateTime<Utc>> {
        millis_to_time(self.checked_at_ms.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> AvailabilitySnapshot {
        AvailabilitySnapshot {
            state: self.current(),
            changed_at: self.changed_at(),
            checked_at: self.checked_at(),
        }
    }
}

impl Default for AvailabilityState {
    fn default() -> Self {
        Self::new()
    }
}

fn millis_to_time(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        None
    } else {
        DateTime::from_timestamp_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let state = AvailabilityState::new();
        assert_eq!(state.current(), Availability::Unknown);
        assert!(state.changed_at().is_none());
        assert!(state.checked_at().is_none());
    }

    #[test]
    fn test_transitions_and_timestamps() {
        let state = AvailabilityState::new();

        assert_eq!(state.record(false), Availability::Unknown);
        assert_eq!(state.current(), Availability::Down);
        let first_change = state.changed_at().unwrap();

        // Same outcome: checked moves, changed does not.
        assert_eq!(state.record(false), Availability::Down);
        assert_eq!(state.changed_at().unwrap(), first_change);
        assert!(state.checked_at().unwrap() >= first_change);

        assert_eq!(state.record(true), Availability::Down);
        assert!(state.is_up());
        assert!(state.changed_at().unwrap() >= first_change);
    }

    #[tokio::test]
    async fn test_every_write_is_published() {
        let state = AvailabilityState::new();
        let mut rx = state.subscribe();

        state.record(false);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Availability::Down);

        state.record(false);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Availability::Down);
    }

    #[test]
    fn test_snapshot_serializes_lowercase() {
        let state = AvailabilityState::new();
        state.record(true);
        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["state"], "up");
        assert!(json["changed_at"].is_string());
    }
}
