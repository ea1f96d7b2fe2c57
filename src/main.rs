//! ScanSphere API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ http server ──▶ availability gate ──▶ handlers
//!                                          │                  │
//!                                          ▼                  ▼
//!                                   connectivity probe ──▶ pool manager ──▶ MySQL
//!                                          │                  ▲
//!                                          ▼                  │
//!                                  availability state ──▶ reconnect scheduler
//! ```
//!
//! The store may be down at startup or go away at any time; the server keeps
//! serving health checks and reads, rejects writes with 503, and reconnects
//! in the background.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use scansphere_api::config::load_config;
use scansphere_api::db::{Datastore, MySqlConnector, SchemaInitializer};
use scansphere_api::http::{HttpServer, ServeOutcome};
use scansphere_api::lifecycle::{signals, startup, Shutdown};
use scansphere_api::observability::{logging, metrics};
use scansphere_api::users::UserSchema;

#[derive(Parser)]
#[command(name = "scansphere-api", version, about = "ScanSphere user API")]
struct Args {
    /// Optional TOML configuration file.
    #[arg(short, long, env = "SCANSPHERE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.environment.as_str(),
        "scansphere-api starting"
    );
    tracing::info!(
        host = %config.database.host,
        user = %config.database.user,
        database = %config.database.database,
        port = config.database.port,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let datastore = Datastore::new(&config, Arc::new(MySqlConnector::new()), |pool| {
        Arc::new(UserSchema::new(pool)) as Arc<dyn SchemaInitializer>
    });

    let shutdown = Shutdown::new();
    let background = datastore.spawn_background(&shutdown);

    startup::connect_datastore(&datastore, config.startup_probe.policy()).await;

    let listener = match startup::bind_listener(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(
                bind_address = %config.listener.bind_address,
                error = %e,
                "Failed to bind listener"
            );
            shutdown.trigger();
            return ExitCode::FAILURE;
        }
    };

    let signal_task = signals::spawn_signal_handler(shutdown.clone());
    let server = HttpServer::new(config, datastore.clone());
    let outcome = server.run(listener, shutdown.clone()).await;

    // The server can also stop on its own (listener error).
    shutdown.trigger();
    signal_task.abort();
    for task in background {
        let _ = task.await;
    }
    datastore.pool().close().await;

    match outcome {
        Ok(ServeOutcome::Drained) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(ServeOutcome::Forced) => {
            tracing::warn!("Forced shutdown with requests in flight");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "HTTP server failed");
            ExitCode::FAILURE
        }
    }
}
