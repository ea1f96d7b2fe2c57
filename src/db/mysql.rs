//! MySQL connector backed by sqlx.
//!
//! # Responsibilities
//! - Build a lazily-connected sqlx pool from `DatabaseConfig`
//! - Check reachability on a one-shot connection bounded by the connect timeout
//! - Keep idle connections warm and report keep-alive failures
//! - Translate sqlx errors into the `DbError` taxonomy
//! - Decode rows into JSON maps

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use secrecy::ExposeSecret;
use serde_json::Value;
use sqlx::mysql::{
    MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlPool,
    MySqlPoolOptions, MySqlRow,
};
use sqlx::query::Query;
use sqlx::{Column, Connection, MySql, Row as _};

use crate::config::DatabaseConfig;
use crate::db::store::{returns_rows, Connector, PoolEvents, PoolStatus, Row, RowSet, SqlValue, StorePool};
use crate::error::{DbError, Result};

/// MySQL server error numbers that mean the session is gone.
const SERVER_GONE: [u16; 4] = [1053, 1927, 2006, 2013];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Opens sqlx MySQL pools.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for MySqlConnector {
    fn open(&self, config: &DatabaseConfig, events: PoolEvents) -> Result<Arc<dyn StorePool>> {
        if config.connection_limit == 0 {
            return Err(DbError::PoolSetup("connection_limit must be at least 1".into()));
        }

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.expose_secret())
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.connection_limit)
            .acquire_timeout(config.connect_timeout())
            .connect_lazy_with(options.clone());

        tokio::spawn(keep_alive(pool.clone(), config.keep_alive_delay(), events));

        Ok(Arc::new(MySqlStore {
            pool,
            options,
            connect_timeout: config.connect_timeout(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MySqlStore {
    pool: MySqlPool,
    options: MySqlConnectOptions,
    connect_timeout: Duration,
    closed: AtomicBool,
}

impl MySqlStore {
    /// Connect once outside the pool.
    ///
    /// The pool retries refused connects until `acquire_timeout`; a direct
    /// connect reports the refusal immediately.
    async fn connect_direct(&self) -> Result<MySqlConnection> {
        let connect = MySqlConnection::connect_with(&self.options);
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(conn) => conn.map_err(classify),
            Err(_) => Err(DbError::Timeout(format!(
                "no connection within {}ms",
                self.connect_timeout.as_millis()
            ))),
        }
    }

    /// Acquire-time timeouts on a pool with no open connection mean the
    /// server never answered.
    fn classify_acquire(&self, err: sqlx::Error) -> DbError {
        match err {
            sqlx::Error::PoolTimedOut if self.pool.size() == 0 => {
                DbError::ConnectionLost("no connection could be established".into())
            }
            other => classify(other),
        }
    }
}

#[async_trait]
impl StorePool for MySqlStore {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet> {
        if self.pool.size() == 0 {
            let conn = self.connect_direct().await?;
            let _ = conn.close().await;
        }

        let query = bind_all(sqlx::query(sql), params);

        if returns_rows(sql) {
            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| self.classify_acquire(e))?;
            Ok(RowSet::from_rows(rows.iter().map(decode_row).collect()))
        } else {
            let done = query
                .execute(&self.pool)
                .await
                .map_err(|e| self.classify_acquire(e))?;
            let last_insert_id = Some(done.last_insert_id()).filter(|id| *id > 0);
            Ok(RowSet::from_write(done.rows_affected(), last_insert_id))
        }
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connect_direct().await?;
        let ok: i64 = sqlx::query_scalar("SELECT 1 AS ok")
            .fetch_one(&mut conn)
            .await
            .map_err(classify)?;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Closing ping connection failed");
        }

        if ok == 1 {
            Ok(())
        } else {
            Err(DbError::query(format!("unexpected ping result {ok}")))
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Closing waits for checked-out connections; don't hold the caller.
        let pool = self.pool.clone();
        tokio::spawn(async move { pool.close().await });
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }
}

async fn keep_alive(pool: MySqlPool, every: Duration, events: PoolEvents) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if pool.is_closed() {
            break;
        }
        if pool.num_idle() == 0 {
            continue;
        }

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            let err = classify(e);
            tracing::warn!(
                generation = events.generation(),
                error = %err,
                "Keep-alive ping failed"
            );
            if err.is_recoverable() {
                events.report(err);
            }
        }
    }

    tracing::debug!(generation = events.generation(), "Keep-alive stopped");
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
        };
    }
    query
}

/// Map a driver error onto the recoverable / non-recoverable split.
pub fn classify(err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::PoolTimedOut => DbError::Timeout("timed out acquiring a connection".into()),
        sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            DbError::ConnectionLost(err.to_string())
        }
        sqlx::Error::Io(io) => match io.kind() {
            ErrorKind::TimedOut => DbError::Timeout(io.to_string()),
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => DbError::ConnectionLost(io.to_string()),
            _ => DbError::query(io.to_string()),
        },
        sqlx::Error::Protocol(message) => DbError::ConnectionLost(message),
        sqlx::Error::Database(db) => {
            let number = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number());

            if number.is_some_and(|n| SERVER_GONE.contains(&n)) {
                DbError::ConnectionLost(db.message().to_string())
            } else if db.is_unique_violation() {
                DbError::Duplicate(db.message().to_string())
            } else {
                DbError::Query {
                    code: number
                        .map(|n| n.to_string())
                        .or_else(|| db.code().map(|c| c.into_owned())),
                    message: db.message().to_string(),
                }
            }
        }
        other => DbError::query(other.to_string()),
    }
}

fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), decode_value(row, column.ordinal())))
        .collect()
}

fn decode_value(row: &MySqlRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(index) {
        return v
            .map(|t| Value::from(t.format(DATETIME_FORMAT).to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return v
            .map(|t| Value::from(t.format(DATETIME_FORMAT).to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(index) {
        return v.map(|d| Value::from(d.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v
            .map(|bytes| Value::from(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null);
    }
    Value::Null
}
