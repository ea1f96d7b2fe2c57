//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so the mapping can be tested without
/// mutating process state.
pub fn apply_env_overrides<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(host) = get("DB_HOST") {
        config.database.host = host;
    }
    if let Some(user) = get("DB_USER") {
        config.database.user = user;
    }
    if let Some(password) = lookup("DB_PASSWORD") {
        config.database.password = Arc::new(SecretString::from(password));
    }
    if let Some(name) = get("DB_NAME") {
        config.database.database = name;
    }
    if let Some(port) = get("DB_PORT") {
        config.database.port = parse_var("DB_PORT", port)?;
    }
    if let Some(limit) = get("DB_CONNECTION_LIMIT") {
        config.database.connection_limit = parse_var("DB_CONNECTION_LIMIT", limit)?;
    }
    if let Some(delay) = get("DB_KEEP_ALIVE_DELAY_MS") {
        config.database.keep_alive_delay_ms = parse_var("DB_KEEP_ALIVE_DELAY_MS", delay)?;
    }
    if let Some(timeout) = get("DB_CONNECT_TIMEOUT_MS") {
        config.database.connect_timeout_ms = parse_var("DB_CONNECT_TIMEOUT_MS", timeout)?;
    }

    if get("PORT").is_some() || get("BIND_HOST").is_some() {
        let (default_host, default_port) = split_bind_address(&config.listener.bind_address);
        let host = get("BIND_HOST").unwrap_or(default_host);
        let port = match get("PORT") {
            Some(port) => parse_var::<u16>("PORT", port)?.to_string(),
            None => default_port,
        };
        config.listener.bind_address = format!("{host}:{port}");
    }

    if let Some(env) = get("APP_ENV").or_else(|| get("NODE_ENV")) {
        config.environment = env.parse().map_err(|_| ConfigError::Env {
            var: "APP_ENV",
            value: env.clone(),
        })?;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.observability.log_format = format.parse().map_err(|_| ConfigError::Env {
            var: "LOG_FORMAT",
            value: format.clone(),
        })?;
    }
    if let Some(addr) = get("METRICS_ADDRESS") {
        config.observability.metrics_address = addr;
        config.observability.metrics_enabled = true;
    }

    Ok(config)
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

fn split_bind_address(addr: &str) -> (String, String) {
    match addr.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.to_string()),
        None => (addr.to_string(), "5001".to_string()),
    }
}
