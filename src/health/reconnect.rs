//! Background reconnection.
//!
//! # States
//! - Idle: the store is reachable (or nobody asked for a reconnect)
//! - Armed: a reconnect cycle is pending
//!
//! # State Transitions
//! ```text
//! Idle → Armed: a probe recorded Down, or arm() was called
//! Armed → Armed: cycle probe failed, wait another interval
//! Armed → Idle: cycle probe succeeded, schema initialized
//! ```
//!
//! # Design Decisions
//! - One long-lived task; arming while armed is a no-op
//! - Retries are unbounded; only shutdown stops the loop

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Notify};

use crate::config::ReconnectConfig;
use crate::db::SchemaInitializer;
use crate::health::probe::ConnectivityProbe;
use crate::health::state::Availability;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Armed,
}

pub struct ReconnectScheduler {
    probe: Arc<ConnectivityProbe>,
    schema: Arc<dyn SchemaInitializer>,
    config: ReconnectConfig,
    armed: AtomicBool,
    wake: Notify,
    cycles: AtomicU64,
}

impl ReconnectScheduler {
    pub fn new(
        probe: Arc<ConnectivityProbe>,
        schema: Arc<dyn SchemaInitializer>,
        config: ReconnectConfig,
    ) -> Self {
        Self {
            probe,
            schema,
            config,
            armed: AtomicBool::new(false),
            wake: Notify::new(),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.is_armed() {
            SchedulerState::Armed
        } else {
            SchedulerState::Idle
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Reconnect cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Schedule a reconnect. Returns false if one is already pending.
    pub fn arm(&self) -> bool {
        if self
            .armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::info!(
                interval_ms = self.config.interval_ms,
                "Scheduling database reconnection attempt"
            );
            self.wake.notify_one();
            true
        } else {
            tracing::debug!("Database reconnection already scheduled");
            false
        }
    }

    /// Run the scheduler loop until shutdown.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let availability = self.probe.availability().clone();
        let mut updates = availability.subscribe();

        if availability.current() == Availability::Down {
            self.arm();
        }

        tracing::info!("Reconnect scheduler started");

        loop {
            if !self.is_armed() {
                tokio::select! {
                    _ = self.wake.notified() => {}
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *updates.borrow_and_update() == Availability::Down {
                            self.arm();
                        }
                    }
                    _ = shutdown.recv() => break,
                }
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval()) => {}
                _ = shutdown.recv() => break,
            }

            self.attempt().await;

            // Our own probe wrote those updates; only a Down written after a
            // successful cycle still needs a reconnect.
            updates.borrow_and_update();
            if !self.is_armed() && availability.current() == Availability::Down {
                self.arm();
            }
        }

        tracing::info!("Reconnect scheduler stopped");
    }

    async fn attempt(&self) -> bool {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(cycle, "Attempting to reconnect to database");

        let reconnected = self.probe.probe_with(self.config.policy()).await;
        metrics::record_reconnect_attempt(reconnected);

        if reconnected {
            tracing::info!(cycle, "Successfully reconnected to database");
            match self.schema.initialize().await {
                Ok(()) => tracing::info!("Database initialization successful after reconnect"),
                Err(e) => tracing::error!(error = %e, "Database initialization failed after reconnect"),
            }
            self.armed.store(false, Ordering::Release);
        } else {
            tracing::warn!(
                cycle,
                retry_in_ms = self.config.interval_ms,
                "Database reconnection failed, will try again later"
            );
        }

        reconnected
    }
}
