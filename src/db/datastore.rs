//! The datastore handle shared by the HTTP layer and background tasks.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::db::pool::PoolManager;
use crate::db::schema::SchemaInitializer;
use crate::db::store::Connector;
use crate::health::{AvailabilityState, ConnectivityProbe, ReconnectScheduler};
use crate::lifecycle::Shutdown;
use crate::resilience::AvailabilityGate;

/// Pool, availability state, probe, gate and reconnect loop wired together.
///
/// Built once at startup and passed around behind an `Arc`.
pub struct Datastore {
    pool: Arc<PoolManager>,
    availability: Arc<AvailabilityState>,
    probe: Arc<ConnectivityProbe>,
    gate: AvailabilityGate,
    scheduler: Arc<ReconnectScheduler>,
    schema: Arc<dyn SchemaInitializer>,
}

impl Datastore {
    /// `schema` receives the pool manager so the initializer can run its
    /// statements through it.
    pub fn new<F>(config: &AppConfig, connector: Arc<dyn Connector>, schema: F) -> Arc<Self>
    where
        F: FnOnce(Arc<PoolManager>) -> Arc<dyn SchemaInitializer>,
    {
        let pool = Arc::new(PoolManager::new(config.database.clone(), connector));
        let availability = Arc::new(AvailabilityState::new());
        let probe = Arc::new(ConnectivityProbe::new(pool.clone(), availability.clone()));
        let gate = AvailabilityGate::new(availability.clone(), probe.clone());
        let schema = schema(pool.clone());
        let scheduler = Arc::new(ReconnectScheduler::new(
            probe.clone(),
            schema.clone(),
            config.reconnect.clone(),
        ));

        Arc::new(Self {
            pool,
            availability,
            probe,
            gate,
            scheduler,
            schema,
        })
    }

    pub fn pool(&self) -> &Arc<PoolManager> {
        &self.pool
    }

    pub fn availability(&self) -> &Arc<AvailabilityState> {
        &self.availability
    }

    pub fn probe(&self) -> &Arc<ConnectivityProbe> {
        &self.probe
    }

    pub fn gate(&self) -> &AvailabilityGate {
        &self.gate
    }

    pub fn scheduler(&self) -> &Arc<ReconnectScheduler> {
        &self.scheduler
    }

    /// Start the pool error watcher and the reconnect loop.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let pool = self.pool.clone();
        let pool_shutdown = shutdown.subscribe();
        let watcher = tokio::spawn(async move { pool.watch_pool_errors(pool_shutdown).await });

        let scheduler = self.scheduler.clone();
        let scheduler_shutdown = shutdown.subscribe();
        let reconnect = tokio::spawn(async move { scheduler.run(scheduler_shutdown).await });

        vec![watcher, reconnect]
    }

    /// Run the schema initializer. Failure is logged, never fatal.
    pub async fn initialize_schema(&self) -> bool {
        match self.schema.initialize().await {
            Ok(()) => {
                tracing::info!("Database initialization successful");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Database initialization failed");
                false
            }
        }
    }
}
