//! Startup orchestration.
//!
//! # Responsibilities
//! - Run the initial connectivity probe and schema initialization
//! - Bind the listener, falling back to the next port once
//!
//! # Design Decisions
//! - An unreachable store never blocks startup; the reconnect loop takes over
//! - Binding is the only fatal step

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ListenerConfig;
use crate::db::Datastore;
use crate::resilience::RetryPolicy;

/// Probe the store and initialize the schema if it is reachable.
///
/// Returns whether the store was reachable. When it was not, the reconnect
/// loop is armed and startup continues.
pub async fn connect_datastore(datastore: &Datastore, policy: RetryPolicy) -> bool {
    tracing::info!(
        attempts = policy.max_attempts,
        delay_ms = policy.delay.as_millis() as u64,
        "Checking database connectivity"
    );

    if datastore.probe().probe_with(policy).await {
        datastore.initialize_schema().await;
        true
    } else {
        tracing::warn!("Starting without database connectivity, reconnect scheduled");
        datastore.scheduler().arm();
        false
    }
}

/// Bind the configured address. If the port is taken and fallback is on,
/// try the next port once.
pub async fn bind_listener(config: &ListenerConfig) -> io::Result<TcpListener> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse && config.port_fallback && addr.port() != 0 => {
            let fallback = SocketAddr::new(addr.ip(), addr.port().wrapping_add(1));
            tracing::warn!(
                port = addr.port(),
                fallback_port = fallback.port(),
                "Port in use, trying next port"
            );
            TcpListener::bind(fallback).await
        }
        Err(e) => Err(e),
    }
}
