use async_trait::async_trait;

use crate::error::Result;

/// Idempotently creates the tables the service needs.
///
/// Run after the first successful probe and again after every reconnect.
#[async_trait]
pub trait SchemaInitializer: Send + Sync {
    async fn initialize(&self) -> Result<()>;
}

/// Initializer for deployments whose schema is managed elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSchema;

#[async_trait]
impl SchemaInitializer for NoSchema {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }
}
