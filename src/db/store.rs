//! Store abstraction.
//!
//! # Responsibilities
//! - Describe an opaque pool handle (`StorePool`) and how to open one (`Connector`)
//! - Carry query parameters and results in a driver-neutral shape
//! - Deliver asynchronous pool errors back to the owner (`PoolEvents`)
//!
//! # Design Decisions
//! - Opening a pool is synchronous and lazy; the first query connects
//! - Rows are JSON maps so handlers can shape responses without driver types
//! - Every handle is tagged with a generation so stale events can be dropped

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::config::DatabaseConfig;
use crate::error::{DbError, Result};

/// A single result row keyed by column name.
pub type Row = Map<String, Value>;

/// Result of a statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

impl RowSet {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows_affected: rows.len() as u64,
            rows,
            last_insert_id: None,
        }
    }

    pub fn from_write(rows_affected: u64, last_insert_id: Option<u64>) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected,
            last_insert_id,
        }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Integer value of `column` in the first row.
    pub fn scalar_i64(&self, column: &str) -> Option<i64> {
        self.first()?.get(column)?.as_i64()
    }
}

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => SqlValue::Int(v),
            Err(_) => SqlValue::Text(value.to_string()),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Connection counts reported by a pool handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub size: u32,
    pub idle: usize,
}

/// An open connection pool. Exactly one is live inside a `PoolManager`.
#[async_trait]
pub trait StorePool: Send + Sync {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet>;

    /// Acquire a connection and run a trivial round trip.
    async fn ping(&self) -> Result<()>;

    /// Release the pool. Calling it twice must be harmless.
    async fn close(&self);

    fn status(&self) -> PoolStatus;
}

/// Builds pool handles. Injected so tests can substitute the store.
pub trait Connector: Send + Sync {
    fn open(&self, config: &DatabaseConfig, events: PoolEvents) -> Result<Arc<dyn StorePool>>;
}

/// An error raised by a pool outside of any caller's query.
#[derive(Debug, Clone)]
pub struct PoolEvent {
    pub generation: u64,
    pub error: DbError,
}

/// Sink a pool handle uses to report background errors to its owner.
#[derive(Debug, Clone)]
pub struct PoolEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<PoolEvent>,
}

impl PoolEvents {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<PoolEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an error. Dropped silently once the owner has gone away.
    pub fn report(&self, error: DbError) {
        let _ = self.tx.send(PoolEvent {
            generation: self.generation,
            error,
        });
    }
}

/// Whether a statement produces a result set rather than a write summary.
pub fn returns_rows(sql: &str) -> bool {
    let verb = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        verb.as_str(),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH"
    )
}
