//! Shared utilities for integration and load testing.
//!
//! `MemoryDb` stands in for MySQL: it can be made unreachable, can fail the
//! next statement with a chosen error, and counts pool opens and closes.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use scansphere_api::config::{AppConfig, DatabaseConfig};
use scansphere_api::db::{
    Connector, Datastore, PoolEvents, PoolStatus, Row, RowSet, SchemaInitializer, SqlValue,
    StorePool,
};
use scansphere_api::error::{DbError, Result};
use scansphere_api::http::{HttpServer, ServeOutcome};
use scansphere_api::lifecycle::{startup, Shutdown};
use scansphere_api::users::UserSchema;
use scansphere_client::ApiClient;

#[derive(Debug, Clone)]
struct StoredUser {
    id: i64,
    username: String,
    email: String,
    password: String,
}

/// In-memory store with failure injection.
#[derive(Default)]
pub struct MemoryDb {
    unreachable: AtomicBool,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub pings: AtomicUsize,
    pub queries: AtomicUsize,
    table_exists: AtomicBool,
    query_delay_ms: AtomicUsize,
    failing_pings: AtomicUsize,
    fail_next: Mutex<Option<DbError>>,
    users: Mutex<Vec<StoredUser>>,
    events: Mutex<Option<PoolEvents>>,
}

impl MemoryDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unreachable() -> Arc<Self> {
        let db = Self::new();
        db.set_reachable(false);
        db
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }

    /// Fail the next statement (not ping) with `err`.
    pub fn fail_next(&self, err: DbError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    /// Fail the next `n` pings even while reachable.
    pub fn fail_pings(&self, n: usize) {
        self.failing_pings.store(n, Ordering::SeqCst);
    }

    /// Make every statement wait before answering.
    pub fn set_query_delay(&self, delay: Duration) {
        self.query_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn table_exists(&self) -> bool {
        self.table_exists.load(Ordering::SeqCst)
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    /// Event sink handed to the most recently opened pool.
    pub fn last_events(&self) -> Option<PoolEvents> {
        self.events.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn dispatch(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet> {
        let text = |i: usize| match params.get(i) {
            Some(SqlValue::Text(s)) => s.clone(),
            other => panic!("expected text parameter {i}, got {other:?}"),
        };

        if sql.contains("information_schema") {
            let rows = if self.table_exists() {
                vec![row(json!({ "TABLE_NAME": "users" }))]
            } else {
                Vec::new()
            };
            return Ok(RowSet::from_rows(rows));
        }

        if sql.starts_with("CREATE TABLE IF NOT EXISTS users") {
            self.table_exists.store(true, Ordering::SeqCst);
            return Ok(RowSet::from_write(0, None));
        }

        if sql.starts_with("SELECT 1") {
            return Ok(RowSet::from_rows(vec![row(json!({ "ok": 1 }))]));
        }

        if !self.table_exists() {
            return Err(DbError::Query {
                code: Some("1146".into()),
                message: "Table 'scansphere.users' doesn't exist".into(),
            });
        }

        let mut users = self.users.lock().unwrap();

        if sql.starts_with("INSERT INTO users") {
            let email = text(1);
            if users.iter().any(|u| u.email == email) {
                return Err(DbError::Duplicate(format!(
                    "Duplicate entry '{email}' for key 'users.email'"
                )));
            }
            let id = users.len() as i64 + 1;
            users.push(StoredUser {
                id,
                username: text(0),
                email,
                password: text(2),
            });
            return Ok(RowSet::from_write(1, Some(id as u64)));
        }

        let full = |u: &StoredUser| {
            row(json!({
                "id": u.id,
                "username": u.username,
                "email": u.email,
                "password": u.password,
                "created_at": "2024-01-01 00:00:00",
            }))
        };

        if sql.contains("WHERE email = ?") {
            let email = text(0);
            let rows = users.iter().filter(|u| u.email == email).map(full).collect();
            return Ok(RowSet::from_rows(rows));
        }

        if sql.contains("FROM users ORDER BY id DESC") {
            let rows = users
                .iter()
                .rev()
                .map(|u| {
                    row(json!({
                        "id": u.id,
                        "username": u.username,
                        "email": u.email,
                        "created_at": "2024-01-01 00:00:00",
                    }))
                })
                .collect();
            return Ok(RowSet::from_rows(rows));
        }

        Err(DbError::query(format!("unsupported statement: {sql}")))
    }
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row must be an object, got {other}"),
    }
}

struct MemoryPool {
    db: Arc<MemoryDb>,
    closed: AtomicBool,
}

impl MemoryPool {
    fn check(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::ConnectionLost("pool is closed".into()));
        }
        if !self.db.is_reachable() {
            return Err(DbError::ConnectionLost("connect ECONNREFUSED".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorePool for MemoryPool {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet> {
        self.db.queries.fetch_add(1, Ordering::SeqCst);

        let delay = self.db.query_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        self.check()?;
        if let Some(err) = self.db.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        self.db.dispatch(sql, params)
    }

    async fn ping(&self) -> Result<()> {
        self.db.pings.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let failing = self
            .db
            .failing_pings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(DbError::ConnectionLost("connect ECONNREFUSED".into()));
        }
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.db.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn status(&self) -> PoolStatus {
        PoolStatus { size: 1, idle: 1 }
    }
}

/// Connector opening `MemoryPool`s over a shared `MemoryDb`.
pub struct FlakyConnector {
    db: Arc<MemoryDb>,
}

impl FlakyConnector {
    pub fn new(db: Arc<MemoryDb>) -> Arc<Self> {
        Arc::new(Self { db })
    }
}

impl Connector for FlakyConnector {
    fn open(&self, _config: &DatabaseConfig, events: PoolEvents) -> Result<Arc<dyn StorePool>> {
        self.db.opened.fetch_add(1, Ordering::SeqCst);
        *self.db.events.lock().unwrap() = Some(events);
        Ok(Arc::new(MemoryPool {
            db: self.db.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Configuration with short intervals suitable for tests.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.port_fallback = false;
    config.database.reconnect_delay_ms = 100;
    config.startup_probe.max_attempts = 2;
    config.startup_probe.delay_ms = 10;
    config.reconnect.interval_ms = 100;
    config.reconnect.max_attempts = 2;
    config.reconnect.delay_ms = 10;
    config.health.probe_attempts = 1;
    config.health.probe_delay_ms = 10;
    config.timeouts.shutdown_grace_secs = 1;
    config
}

pub fn datastore(config: &AppConfig, db: &Arc<MemoryDb>) -> Arc<Datastore> {
    Datastore::new(config, FlakyConnector::new(db.clone()), |pool| {
        Arc::new(UserSchema::new(pool)) as Arc<dyn SchemaInitializer>
    })
}

/// A running API server backed by a `MemoryDb`.
pub struct TestServer {
    pub addr: SocketAddr,
    pub datastore: Arc<Datastore>,
    pub shutdown: Shutdown,
    pub client: ApiClient,
    pub http: reqwest::Client,
    handle: JoinHandle<std::io::Result<ServeOutcome>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) -> ServeOutcome {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap()
    }
}

/// Boot the full stack the way `main` does, on an ephemeral port.
pub async fn start_server(config: AppConfig, db: &Arc<MemoryDb>) -> TestServer {
    let datastore = datastore(&config, db);
    let shutdown = Shutdown::new();
    datastore.spawn_background(&shutdown);

    startup::connect_datastore(&datastore, config.startup_probe.policy()).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config, datastore.clone());
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    let client = ApiClient::with_client(http.clone(), &format!("http://{addr}"));

    TestServer {
        addr,
        datastore,
        shutdown,
        client,
        http,
        handle,
    }
}

/// Poll `check` every 10ms until it holds or `timeout` passes.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Synchronous variant of `wait_until`.
pub async fn wait_for(timeout: Duration, check: impl Fn() -> bool) -> bool {
    wait_until(timeout, || std::future::ready(check())).await
}
