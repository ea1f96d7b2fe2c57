//! Error types for the database subsystem.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Transport-level loss or refusal. The pool is replaced before this
    /// reaches the caller, so a retry normally lands on a fresh pool.
    #[error("database connection lost, retry the request: {0}")]
    ConnectionLost(String),

    #[error("database operation timed out: {0}")]
    Timeout(String),

    #[error("duplicate entry: {0}")]
    Duplicate(String),

    #[error("query failed: {message}")]
    Query {
        code: Option<String>,
        message: String,
    },

    #[error("failed to set up connection pool: {0}")]
    PoolSetup(String),
}

impl DbError {
    /// True for the failure classes that recreating the pool can resolve.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DbError::ConnectionLost(_) | DbError::Timeout(_))
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::ConnectionLost(_) => "connection_lost",
            DbError::Timeout(_) => "timeout",
            DbError::Duplicate(_) => "duplicate",
            DbError::Query { .. } => "query",
            DbError::PoolSetup(_) => "pool_setup",
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        DbError::Query {
            code: None,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classes() {
        assert!(DbError::ConnectionLost("ECONNREFUSED".into()).is_recoverable());
        assert!(DbError::Timeout("acquire".into()).is_recoverable());
        assert!(!DbError::Duplicate("email".into()).is_recoverable());
        assert!(!DbError::query("syntax error").is_recoverable());
        assert!(!DbError::PoolSetup("bad options".into()).is_recoverable());
    }

    #[test]
    fn test_connection_lost_message_asks_for_retry() {
        let err = DbError::ConnectionLost("reset by peer".into());
        assert!(err.to_string().contains("retry"));
        assert_eq!(err.kind(), "connection_lost");
    }
}
