//! End-to-end failure injection through the HTTP API.

use std::time::Duration;

use scansphere_api::config::Environment;
use scansphere_api::error::DbError;
use scansphere_api::health::SchedulerState;
use scansphere_api::http::ServeOutcome;
use scansphere_client::Registration;

mod common;
use common::{start_server, test_config, wait_for, MemoryDb};

fn ada() -> Registration {
    Registration {
        username: "ada".into(),
        email: "ada@example.com".into(),
        password: "correct horse".into(),
    }
}

#[tokio::test]
async fn test_outage_at_startup_then_recovery() {
    let db = MemoryDb::unreachable();
    let server = start_server(test_config(), &db).await;

    // Health stays 200 and describes the outage.
    let res = server.client.health().await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["database"], "disconnected");
    assert_eq!(res.body["users_table"], "unknown");
    assert_eq!(res.body["availability"]["state"], "down");
    assert!(res.body["config"].get("password").is_none());

    // Writes are rejected by the gate.
    let res = server.client.register(&ada()).await.unwrap();
    assert_eq!(res.status, 503);
    assert_eq!(res.status_label(), Some("db_unavailable"));
    assert_eq!(res.body["success"], false);

    // Reads are admitted and fail on the store itself.
    let res = server.client.list_users().await.unwrap();
    assert_eq!(res.status, 503);
    assert_eq!(res.status_label(), Some("db_connection_lost"));

    db.set_reachable(true);
    let datastore = server.datastore.clone();
    assert!(
        wait_for(Duration::from_secs(3), || {
            datastore.availability().is_up()
                && datastore.scheduler().state() == SchedulerState::Idle
        })
        .await,
        "background reconnect did not complete"
    );
    assert!(db.table_exists());

    let res = server.client.health().await.unwrap();
    assert_eq!(res.body["database"], "connected");
    assert_eq!(res.body["users_table"], "exists");
    assert_eq!(res.body["reconnect"], "idle");

    let res = server.client.register(&ada()).await.unwrap();
    assert_eq!(res.status, 201, "body: {}", res.body);
    assert_eq!(res.body["user"]["email"], "ada@example.com");

    assert_eq!(server.stop().await, ServeOutcome::Drained);
}

#[tokio::test]
async fn test_connection_lost_mid_request_replaces_pool() {
    let db = MemoryDb::new();
    let server = start_server(test_config(), &db).await;
    let opened = db.opened();

    db.fail_next(DbError::ConnectionLost("read ECONNRESET".into()));
    let res = server
        .http
        .get(server.url("/api/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.headers()["retry-after"], "5");
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "db_connection_lost");
    assert_eq!(db.opened(), opened + 1);

    // The retry succeeds on the replacement pool.
    let res = server.client.list_users().await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body["count"], 0);

    server.stop().await;
}

#[tokio::test]
async fn test_acquire_timeout_is_server_error() {
    let db = MemoryDb::new();
    let server = start_server(test_config(), &db).await;

    db.fail_next(DbError::Timeout("pool acquire timed out".into()));
    let res = server.client.list_users().await.unwrap();
    assert_eq!(res.status, 500);
    assert_eq!(res.status_label(), Some("db_timeout"));

    server.stop().await;
}

#[tokio::test]
async fn test_user_flows() {
    let db = MemoryDb::new();
    let server = start_server(test_config(), &db).await;
    let client = &server.client;

    let res = client
        .register(&Registration {
            username: "".into(),
            email: "x@example.com".into(),
            password: "pw".into(),
        })
        .await
        .unwrap();
    assert_eq!(res.status, 400);

    let res = client.register(&ada()).await.unwrap();
    assert_eq!(res.status, 201);
    assert!(res.body["user"].get("password").is_none());

    let res = client.register(&ada()).await.unwrap();
    assert_eq!(res.status, 400);
    assert_eq!(res.body["message"], "Email already registered");

    let res = client.login("ada@example.com", "correct horse").await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body["user"]["username"], "ada");
    assert!(res.body["user"].get("password").is_none());

    let res = client.login("ada@example.com", "wrong").await.unwrap();
    assert_eq!(res.status, 401);

    let res = client.login("nobody@example.com", "wrong").await.unwrap();
    assert_eq!(res.status, 401);

    let res = client.login("", "").await.unwrap();
    assert_eq!(res.status, 400);

    let res = client.forgot_password("nobody@example.com").await.unwrap();
    assert_eq!(res.status, 200);
    let known = client.forgot_password("ada@example.com").await.unwrap();
    assert_eq!(known.body["message"], res.body["message"]);

    let res = client.forgot_password("").await.unwrap();
    assert_eq!(res.status, 400);

    let res = client.create_test_user().await.unwrap();
    assert_eq!(res.status, 201);

    let res = client.list_users().await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body["count"], 2);
    assert_eq!(db.user_count(), 2);
    // Newest first.
    assert_eq!(res.body["users"][1]["email"], "ada@example.com");

    server.stop().await;
}

#[tokio::test]
async fn test_test_user_forbidden_in_production() {
    let db = MemoryDb::new();
    let mut config = test_config();
    config.environment = Environment::Production;
    let server = start_server(config, &db).await;

    let res = server.client.create_test_user().await.unwrap();
    assert_eq!(res.status, 403);
    assert_eq!(db.user_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let db = MemoryDb::new();
    let server = start_server(test_config(), &db).await;

    let res = server.http.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));

    let res = server
        .http
        .get(server.url("/api/health"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "abc-123");

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_route_is_not_found_during_outage() {
    let db = MemoryDb::unreachable();
    let server = start_server(test_config(), &db).await;

    let res = server.http.post(server.url("/api/nope")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let res = server.client.register(&ada()).await.unwrap();
    assert_eq!(res.status, 503);

    server.stop().await;
}
