//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API.
//! All types derive Serde traits for deserialization from config files;
//! environment overrides are applied afterwards by the loader.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::resilience::RetryPolicy;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment; gates development-only endpoints.
    pub environment: Environment,

    /// Listener configuration (bind address, port fallback).
    pub listener: ListenerConfig,

    /// Backing store connection settings.
    pub database: DatabaseConfig,

    /// Retry policy of the probe run once at startup.
    pub startup_probe: RetryConfig,

    /// Background reconnect loop settings.
    pub reconnect: ReconnectConfig,

    /// Health endpoint settings.
    pub health: HealthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5001").
    pub bind_address: String,

    /// Retry on port + 1 once when the configured port is taken.
    pub port_fallback: bool,

    /// Maximum concurrently processed requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5001".to_string(),
            port_fallback: true,
            max_connections: 10_000,
        }
    }
}

/// Connection settings for the MySQL store.
///
/// Consumed once when the pool manager is built; changing any of it
/// requires a restart.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,

    pub user: String,

    /// Only ever read from the environment.
    #[serde(skip, default = "empty_secret")]
    pub password: Arc<SecretString>,

    /// Database (schema) name.
    pub database: String,

    pub port: u16,

    /// Maximum physical connections held by the pool.
    pub connection_limit: u32,

    /// Interval between keep-alive pings on idle connections.
    pub keep_alive_delay_ms: u64,

    /// Deadline for establishing or acquiring a connection.
    pub connect_timeout_ms: u64,

    /// Delay before replacing a pool that reported a background error.
    pub reconnect_delay_ms: u64,
}

fn empty_secret() -> Arc<SecretString> {
    Arc::new(SecretString::from(String::new()))
}

impl DatabaseConfig {
    pub fn keep_alive_delay(&self) -> Duration {
        Duration::from_millis(self.keep_alive_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            user: "root".to_string(),
            password: empty_secret(),
            database: "scansphere".to_string(),
            port: 3306,
            connection_limit: 10,
            keep_alive_delay_ms: 10_000,
            connect_timeout_ms: 10_000,
            reconnect_delay_ms: 5_000,
        }
    }
}

/// Bounded retry with a fixed delay.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of probe attempts.
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds.
    pub delay_ms: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 3_000,
        }
    }
}

/// Background reconnect loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Wait between reconnect cycles in milliseconds.
    pub interval_ms: u64,

    /// Probe attempts per cycle.
    pub max_attempts: u32,

    /// Delay between the attempts of one cycle in milliseconds.
    pub delay_ms: u64,
}

impl ReconnectConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            max_attempts: 2,
            delay_ms: 3_000,
        }
    }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Probe attempts made by each health request.
    pub probe_attempts: u32,

    /// Delay between those attempts in milliseconds.
    pub probe_delay_ms: u64,
}

impl HealthConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.probe_attempts, Duration::from_millis(self.probe_delay_ms))
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_attempts: 1,
            probe_delay_ms: 1_000,
        }
    }
}

/// Timeout configuration for request handling and shutdown.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Allow any origin (the API is called from a separately hosted frontend).
    pub permissive_cors: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024,
            permissive_cors: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
