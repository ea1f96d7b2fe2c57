//! Pool replacement behavior of `PoolManager`.

use std::sync::Arc;
use std::time::Duration;

use scansphere_api::config::DatabaseConfig;
use scansphere_api::db::PoolManager;
use scansphere_api::error::DbError;
use scansphere_api::lifecycle::Shutdown;

mod common;
use common::{FlakyConnector, MemoryDb};

fn manager(db: &Arc<MemoryDb>, reconnect_delay_ms: u64) -> Arc<PoolManager> {
    let config = DatabaseConfig {
        reconnect_delay_ms,
        ..DatabaseConfig::default()
    };
    Arc::new(PoolManager::new(config, FlakyConnector::new(db.clone())))
}

#[tokio::test]
async fn test_sequential_creates_leave_one_live_pool() {
    let db = MemoryDb::new();
    let pool = manager(&db, 100);

    for expected in 1..=5u64 {
        assert_eq!(pool.create_pool().await.unwrap(), expected);
    }

    assert_eq!(db.opened(), 5);
    assert_eq!(db.closed(), 4);
    assert!(pool.has_pool());
    assert_eq!(pool.generation(), Some(5));

    pool.close().await;
    assert_eq!(db.closed(), 5);
    assert!(!pool.has_pool());
}

#[tokio::test]
async fn test_recoverable_error_replaces_pool_and_reaches_caller() {
    let db = MemoryDb::new();
    let pool = manager(&db, 100);
    pool.execute("SELECT 1 AS ok", &[]).await.unwrap();

    db.fail_next(DbError::ConnectionLost("read ECONNRESET".into()));
    let err = pool.execute("SELECT 1 AS ok", &[]).await.unwrap_err();

    assert!(matches!(err, DbError::ConnectionLost(_)));
    assert_eq!(pool.generation(), Some(2));
    assert_eq!(db.closed(), 1);

    // The retry lands on the fresh pool.
    let rows = pool.execute("SELECT 1 AS ok", &[]).await.unwrap();
    assert_eq!(rows.scalar_i64("ok"), Some(1));
}

#[tokio::test]
async fn test_non_recoverable_error_keeps_pool() {
    let db = MemoryDb::new();
    let pool = manager(&db, 100);
    pool.ensure_pool().await.unwrap();

    db.fail_next(DbError::query("You have an error in your SQL syntax"));
    let err = pool.execute("SELECT 1 AS ok", &[]).await.unwrap_err();

    assert!(matches!(err, DbError::Query { .. }));
    assert_eq!(pool.generation(), Some(1));
    assert_eq!(db.opened(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_replace_once() {
    let db = MemoryDb::new();
    let pool = manager(&db, 100);
    pool.ensure_pool().await.unwrap();

    // Every statement waits, so all callers hold generation 1 when they fail.
    db.set_query_delay(Duration::from_millis(50));
    db.set_reachable(false);

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            pool.execute("SELECT 1 AS ok", &[]).await
        }));
    }
    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_recoverable());
    }

    assert_eq!(db.opened(), 2, "only one replacement pool");
    assert_eq!(db.closed(), 1);
    assert_eq!(pool.generation(), Some(2));
}

#[tokio::test]
async fn test_pool_event_replaces_after_delay() {
    let db = MemoryDb::new();
    let pool = manager(&db, 150);
    let shutdown = Shutdown::new();

    let watcher = {
        let pool = pool.clone();
        let rx = shutdown.subscribe();
        tokio::spawn(async move { pool.watch_pool_errors(rx).await })
    };

    pool.ensure_pool().await.unwrap();
    let events = db.last_events().unwrap();
    assert_eq!(events.generation(), 1);

    events.report(DbError::ConnectionLost("PROTOCOL_CONNECTION_LOST".into()));
    events.report(DbError::ConnectionLost("PROTOCOL_CONNECTION_LOST".into()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.generation(), Some(1), "replacement must wait for the delay");

    assert!(common::wait_for(Duration::from_secs(2), || pool.generation() == Some(2)).await);

    // Burst was coalesced into one replacement; stale events are ignored.
    events.report(DbError::ConnectionLost("late".into()));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(pool.generation(), Some(2));
    assert_eq!(db.opened(), 2);

    shutdown.trigger();
    watcher.await.unwrap();
}

#[tokio::test]
async fn test_non_recoverable_event_does_not_replace() {
    let db = MemoryDb::new();
    let pool = manager(&db, 50);
    let shutdown = Shutdown::new();

    let watcher = {
        let pool = pool.clone();
        let rx = shutdown.subscribe();
        tokio::spawn(async move { pool.watch_pool_errors(rx).await })
    };

    pool.ensure_pool().await.unwrap();
    db.last_events()
        .unwrap()
        .report(DbError::query("Too many connections"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(pool.generation(), Some(1));

    shutdown.trigger();
    watcher.await.unwrap();
}
