//! Error responses.
//!
//! # Responsibilities
//! - Map domain errors to HTTP status codes
//! - Render them as `{success: false, message, status?}`
//!
//! # Design Decisions
//! - Gate rejections and lost connections are 503 with a machine-readable status
//! - Pool acquisition timeouts are 500
//! - Database details are logged, never returned

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::DbError;
use crate::users::UserError;

/// Seconds a client should wait before retrying after a lost connection.
const RETRY_AFTER_SECS: &str = "5";

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized(String),
    Forbidden(String),
    /// The availability gate rejected a write.
    Unavailable,
    Db(DbError),
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Db(DbError::ConnectionLost(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Db(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable status, where one exists.
    pub fn status_label(&self) -> Option<&'static str> {
        match self {
            ApiError::Unavailable => Some("db_unavailable"),
            ApiError::Db(DbError::ConnectionLost(_)) => Some("db_connection_lost"),
            ApiError::Db(DbError::Timeout(_)) => Some("db_timeout"),
            _ => None,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Validation(msg) | ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => {
                msg.clone()
            }
            ApiError::Unavailable => {
                "Database is temporarily unavailable, please try again later".to_string()
            }
            ApiError::Db(DbError::ConnectionLost(_)) => {
                "Database connection lost, please retry the request".to_string()
            }
            ApiError::Db(DbError::Timeout(_)) => "Database operation timed out".to_string(),
            ApiError::Db(_) | ApiError::Internal(_) => "Server error".to_string(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Db(err)
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::EmailTaken | UserError::Duplicate => ApiError::Validation(err.to_string()),
            UserError::Invalid(msg) => ApiError::Validation(msg),
            UserError::Hashing(msg) => ApiError::Internal(msg),
            UserError::Db(e) => ApiError::Db(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            match &self {
                ApiError::Db(e) => tracing::error!(error = %e, kind = e.kind(), "Request failed"),
                ApiError::Internal(msg) => tracing::error!(error = %msg, "Request failed"),
                _ => {}
            }
        }

        let mut body = json!({
            "success": false,
            "message": self.message(),
        });
        if let Some(label) = self.status_label() {
            body["status"] = json!(label);
        }

        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::Db(DbError::ConnectionLost(_))) {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
