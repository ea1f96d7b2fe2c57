//! Database subsystem.
//!
//! # Data Flow
//! ```text
//! Handler:
//!     → pool.rs PoolManager::execute
//!     → store.rs StorePool::query (mysql.rs in production)
//!     → recoverable failure: replace pool, return error to caller
//!
//! Pool handle background errors:
//!     → store.rs PoolEvents → PoolManager::watch_pool_errors
//!     → delayed replacement
//! ```
//!
//! # Design Decisions
//! - One live pool per process, replaced under a mutex
//! - The driver sits behind `Connector` / `StorePool` for failure injection
//! - `Datastore` bundles everything; no globals

pub mod datastore;
pub mod mysql;
pub mod pool;
pub mod schema;
pub mod store;

pub use datastore::Datastore;
pub use mysql::MySqlConnector;
pub use pool::PoolManager;
pub use schema::{NoSchema, SchemaInitializer};
pub use store::{Connector, PoolEvent, PoolEvents, PoolStatus, Row, RowSet, SqlValue, StorePool};
