//! Pool manager.
//!
//! # Responsibilities
//! - Own the single live pool handle
//! - Create, replace and close it under a single-writer lock
//! - Execute queries, replacing the pool on recoverable failures
//! - React to background pool errors with a delayed replacement

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::config::DatabaseConfig;
use crate::db::store::{Connector, PoolEvent, PoolEvents, PoolStatus, RowSet, SqlValue, StorePool};
use crate::error::{DbError, Result};
use crate::observability::metrics;

/// The live handle together with the generation it was created as.
struct PoolSlot {
    generation: u64,
    store: Arc<dyn StorePool>,
}

/// Owns the connection pool.
///
/// Reads of the current handle are lock-free; every replacement goes
/// through `replace_lock`, so a handle is never closed twice and never
/// left live after it has been superseded.
pub struct PoolManager {
    config: DatabaseConfig,
    connector: Arc<dyn Connector>,
    current: ArcSwapOption<PoolSlot>,
    replace_lock: Mutex<()>,
    generation: AtomicU64,
    events_tx: mpsc::UnboundedSender<PoolEvent>,
    events_rx: Mutex<mpsc::UnboundedReceiver<PoolEvent>>,
}

impl PoolManager {
    pub fn new(config: DatabaseConfig, connector: Arc<dyn Connector>) -> Self {
        tracing::info!(
            host = %config.host,
            user = %config.user,
            database = %config.database,
            port = config.port,
            connection_limit = config.connection_limit,
            "Database pool manager configured"
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            connector,
            current: ArcSwapOption::empty(),
            replace_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            events_tx,
            events_rx: Mutex::new(events_rx),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Generation of the live handle, if any.
    pub fn generation(&self) -> Option<u64> {
        self.current.load_full().map(|slot| slot.generation)
    }

    pub fn has_pool(&self) -> bool {
        self.current.load_full().is_some()
    }

    pub fn status(&self) -> Option<PoolStatus> {
        self.current.load_full().map(|slot| slot.store.status())
    }

    /// Close the current pool (if any) and install a new one.
    ///
    /// Returns the generation of the new handle.
    pub async fn create_pool(&self) -> Result<u64> {
        let _guard = self.replace_lock.lock().await;
        self.replace_locked().await.map(|slot| slot.generation)
    }

    /// Make sure a handle exists without replacing a live one.
    pub async fn ensure_pool(&self) -> Result<()> {
        self.current_or_create().await.map(|_| ())
    }

    /// Run a statement against the current pool.
    ///
    /// A recoverable failure replaces the pool before the error is returned,
    /// so the caller's retry runs against a fresh handle.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet> {
        let slot = self.current_or_create().await?;

        match slot.store.query(sql, params).await {
            Ok(rows) => Ok(rows),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(
                    generation = slot.generation,
                    error = %err,
                    "Lost database connection, replacing pool"
                );
                metrics::record_pool_error(err.kind());
                self.replace_if_current(slot.generation).await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Round trip on one pooled connection. Never replaces the pool.
    pub async fn ping(&self) -> Result<()> {
        let slot = self.current_or_create().await?;
        slot.store.ping().await
    }

    /// Release the live pool. Used at shutdown.
    pub async fn close(&self) {
        let _guard = self.replace_lock.lock().await;
        if let Some(old) = self.current.swap(None) {
            old.store.close().await;
            metrics::record_pool_closed();
            tracing::info!(generation = old.generation, "Database pool closed");
        }
    }

    /// Consume background pool errors until shutdown.
    ///
    /// A recoverable error replaces the pool after `reconnect_delay`, never
    /// immediately; errors arriving during that wait are folded into the
    /// pending replacement.
    pub async fn watch_pool_errors(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut events = self.events_rx.lock().await;
        let delay = self.config.reconnect_delay();

        loop {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = shutdown.recv() => break,
            };

            if self.generation() != Some(event.generation) {
                tracing::debug!(generation = event.generation, "Ignoring error from retired pool");
                continue;
            }

            tracing::error!(
                generation = event.generation,
                error = %event.error,
                "Database pool error"
            );
            metrics::record_pool_error(event.error.kind());

            if !event.error.is_recoverable() {
                continue;
            }

            tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnecting to database");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => break,
            }

            while events.try_recv().is_ok() {}
            self.replace_if_current(event.generation).await;
        }

        tracing::debug!("Pool error watcher stopped");
    }

    async fn current_or_create(&self) -> Result<Arc<PoolSlot>> {
        if let Some(slot) = self.current.load_full() {
            return Ok(slot);
        }

        let _guard = self.replace_lock.lock().await;
        if let Some(slot) = self.current.load_full() {
            return Ok(slot);
        }
        self.replace_locked().await
    }

    /// Replace the pool unless someone already replaced `generation`.
    async fn replace_if_current(&self, generation: u64) {
        let _guard = self.replace_lock.lock().await;
        let superseded = self
            .current
            .load_full()
            .is_some_and(|slot| slot.generation != generation);

        if superseded {
            tracing::debug!(generation, "Pool already replaced");
            return;
        }
        // Failure is logged inside; the next execute retries lazily.
        let _ = self.replace_locked().await;
    }

    /// Caller must hold `replace_lock`.
    async fn replace_locked(&self) -> Result<Arc<PoolSlot>> {
        if let Some(old) = self.current.swap(None) {
            tracing::debug!(generation = old.generation, "Closing existing pool");
            old.store.close().await;
            metrics::record_pool_closed();
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let events = PoolEvents::new(generation, self.events_tx.clone());

        match self.connector.open(&self.config, events) {
            Ok(store) => {
                let slot = Arc::new(PoolSlot { generation, store });
                self.current.store(Some(slot.clone()));
                metrics::record_pool_created();
                tracing::info!(generation, "Database pool created");
                Ok(slot)
            }
            Err(err) => {
                tracing::error!(generation, error = %err, "Failed to set up database pool");
                Err(match err {
                    DbError::PoolSetup(_) => err,
                    other => DbError::PoolSetup(other.to_string()),
                })
            }
        }
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("host", &self.config.host)
            .field("database", &self.config.database)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
