//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define database availability metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `db_pool_created_total` (counter): pool handles opened
//! - `db_pool_closed_total` (counter): pool handles released
//! - `db_pool_errors_total` (counter): recoverable pool errors by kind
//! - `db_probe_total` (counter): probe outcomes by result
//! - `db_probe_duration_seconds` (histogram): time spent probing, retries included
//! - `db_probe_attempts` (histogram): attempts used per probe
//! - `db_availability` (gauge): 1=up, 0=down
//! - `gate_decisions_total` (counter): admissions by kind, decision
//! - `db_reconnect_attempts_total` (counter): reconnect cycles by result
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The exporter is optional and off by default

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::Availability;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_pool_created() {
    ::metrics::counter!("db_pool_created_total").increment(1);
}

pub fn record_pool_closed() {
    ::metrics::counter!("db_pool_closed_total").increment(1);
}

pub fn record_pool_error(kind: &'static str) {
    ::metrics::counter!("db_pool_errors_total", "kind" => kind).increment(1);
}

pub fn record_probe(success: bool, attempts: u32, started: Instant) {
    let result = if success { "up" } else { "down" };
    ::metrics::counter!("db_probe_total", "result" => result).increment(1);
    ::metrics::histogram!("db_probe_duration_seconds").record(started.elapsed().as_secs_f64());
    ::metrics::histogram!("db_probe_attempts").record(f64::from(attempts));
}

pub fn set_availability(state: Availability) {
    let value = match state {
        Availability::Up => 1.0,
        Availability::Down | Availability::Unknown => 0.0,
    };
    ::metrics::gauge!("db_availability").set(value);
}

pub fn record_admission(kind: &'static str, allowed: bool) {
    let decision = if allowed { "allow" } else { "reject" };
    ::metrics::counter!("gate_decisions_total", "kind" => kind, "decision" => decision).increment(1);
}

pub fn record_reconnect_attempt(success: bool) {
    let result = if success { "success" } else { "failure" };
    ::metrics::counter!("db_reconnect_attempts_total", "result" => result).increment(1);
}
