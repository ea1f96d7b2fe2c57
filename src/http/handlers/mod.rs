//! Route handlers.

pub mod health;
pub mod users;

use axum::Json;
use serde_json::{json, Value};

/// Service banner.
pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "ScanSphere API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": [
            "GET /api/health",
            "GET /api/users",
            "POST /api/register",
            "POST /api/login",
            "POST /api/forgot-password",
            "POST /api/test-user",
        ],
    }))
}
