//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, limits, CORS, availability gate)
//! - Serve until shutdown, then drain within the grace period

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::db::Datastore;
use crate::http::handlers::{self, health, users};
use crate::http::middleware::availability_gate;
use crate::http::request::X_REQUEST_ID;
use crate::lifecycle::Shutdown;
use crate::users::{UserRepository, UserSchema};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub datastore: Arc<Datastore>,
    pub users: UserRepository,
    pub schema: Arc<UserSchema>,
    pub config: Arc<AppConfig>,
}

/// How the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// All in-flight requests finished within the grace period.
    Drained,
    /// The grace period ran out with requests still in flight.
    Forced,
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig, datastore: Arc<Datastore>) -> Self {
        let config = Arc::new(config);
        let pool = datastore.pool().clone();

        let state = AppState {
            users: UserRepository::new(pool.clone()),
            schema: Arc::new(UserSchema::new(pool)),
            datastore,
            config: config.clone(),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/", get(handlers::index))
            .route("/api/health", get(health::health))
            .route("/api/users", get(users::list_users))
            .route("/api/test-user", post(users::create_test_user))
            .route("/api/register", post(users::register))
            .route("/api/login", post(users::login))
            .route("/api/forgot-password", post(users::forgot_password))
            .route_layer(middleware::from_fn_with_state(state.clone(), availability_gate))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections));

        if config.security.permissive_cors {
            router = router.layer(CorsLayer::permissive());
        }

        router
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve on `listener` until `shutdown` fires, then give in-flight
    /// requests the configured grace period.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<ServeOutcome> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let mut stop = shutdown.subscribe();
        let mut deadline = shutdown.subscribe();

        let server = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("HTTP server draining");
            })
            .into_future();

        let outcome = tokio::select! {
            result = server => {
                result?;
                ServeOutcome::Drained
            }
            _ = async {
                let _ = deadline.recv().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(grace_secs = grace.as_secs(), "Grace period elapsed, forcing shutdown");
                ServeOutcome::Forced
            }
        };

        tracing::info!("HTTP server stopped");
        Ok(outcome)
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
