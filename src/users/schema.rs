//! `users` table management.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::db::{PoolManager, SchemaInitializer};
use crate::error::Result;

pub const CREATE_USERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
    id INT AUTO_INCREMENT PRIMARY KEY,
    username VARCHAR(80) NOT NULL,
    email VARCHAR(120) NOT NULL UNIQUE,
    password VARCHAR(255) NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

const TABLE_LOOKUP: &str = "SELECT TABLE_NAME FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

/// Whether the `users` table is present, as reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Exists,
    Missing,
    /// The store was not reachable, so nothing was checked.
    Unknown,
    Error(String),
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableStatus::Exists => f.write_str("exists"),
            TableStatus::Missing => f.write_str("missing"),
            TableStatus::Unknown => f.write_str("unknown"),
            TableStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

impl Serialize for TableStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub struct UserSchema {
    pool: Arc<PoolManager>,
}

impl UserSchema {
    pub fn new(pool: Arc<PoolManager>) -> Self {
        Self { pool }
    }

    pub async fn table_status(&self) -> TableStatus {
        let database = self.pool.config().database.clone();
        match self
            .pool
            .execute(TABLE_LOOKUP, &[database.into(), "users".into()])
            .await
        {
            Ok(rows) if rows.is_empty() => TableStatus::Missing,
            Ok(_) => TableStatus::Exists,
            Err(e) => TableStatus::Error(e.to_string()),
        }
    }
}

#[async_trait]
impl SchemaInitializer for UserSchema {
    async fn initialize(&self) -> Result<()> {
        self.pool.execute(CREATE_USERS_TABLE, &[]).await?;
        tracing::info!("Users table ensured");
        Ok(())
    }
}
