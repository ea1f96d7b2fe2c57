//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, limits non-zero)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    let db = &config.database;
    if db.host.trim().is_empty() {
        errors.push(ValidationError::new("database.host", "must not be empty"));
    }
    if db.database.trim().is_empty() {
        errors.push(ValidationError::new("database.database", "must not be empty"));
    }
    if db.port == 0 {
        errors.push(ValidationError::new("database.port", "must be between 1 and 65535"));
    }
    if db.connection_limit == 0 {
        errors.push(ValidationError::new("database.connection_limit", "must be greater than 0"));
    }
    if db.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("database.connect_timeout_ms", "must be greater than 0"));
    }
    if db.keep_alive_delay_ms == 0 {
        errors.push(ValidationError::new("database.keep_alive_delay_ms", "must be greater than 0"));
    }

    if config.startup_probe.max_attempts == 0 {
        errors.push(ValidationError::new("startup_probe.max_attempts", "must be at least 1"));
    }
    if config.reconnect.max_attempts == 0 {
        errors.push(ValidationError::new("reconnect.max_attempts", "must be at least 1"));
    }
    if config.reconnect.interval_ms == 0 {
        errors.push(ValidationError::new("reconnect.interval_ms", "must be greater than 0"));
    }
    if config.health.probe_attempts == 0 {
        errors.push(ValidationError::new("health.probe_attempts", "must be at least 1"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
