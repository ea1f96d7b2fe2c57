//! Readiness endpoint. Always answers 200; the body describes the store.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::db::PoolStatus;
use crate::health::{AvailabilitySnapshot, SchedulerState};
use crate::http::request::RequestId;
use crate::http::server::AppState;
use crate::users::TableStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub database: &'static str,
    pub users_table: TableStatus,
    pub availability: AvailabilitySnapshot,
    pub reconnect: SchedulerState,
    pub pool: PoolInfo,
    pub config: DatabaseInfo,
}

#[derive(Debug, Serialize)]
pub struct PoolInfo {
    pub generation: Option<u64>,
    #[serde(flatten)]
    pub status: Option<PoolStatus>,
}

/// Connection target, without the credential.
#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    pub host: String,
    pub user: String,
    pub database: String,
    pub port: u16,
}

pub async fn health(State(state): State<AppState>, request_id: RequestId) -> Json<HealthResponse> {
    let datastore = &state.datastore;
    let connected = datastore
        .probe()
        .probe_with(state.config.health.policy())
        .await;

    let users_table = if connected {
        state.schema.table_status().await
    } else {
        TableStatus::Unknown
    };

    tracing::debug!(request_id = %request_id, connected, users_table = %users_table, "Health check");

    let db = datastore.pool().config();
    Json(HealthResponse {
        status: "healthy",
        message: "ScanSphere API is running",
        database: if connected { "connected" } else { "disconnected" },
        users_table,
        availability: datastore.availability().snapshot(),
        reconnect: datastore.scheduler().state(),
        pool: PoolInfo {
            generation: datastore.pool().generation(),
            status: datastore.pool().status(),
        },
        config: DatabaseInfo {
            host: db.host.clone(),
            user: db.user.clone(),
            database: db.database.clone(),
            port: db.port,
        },
    })
}
