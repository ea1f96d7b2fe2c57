//! User routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::request::RequestId;
use crate::http::response::{ApiError, ApiResult};
use crate::http::server::AppState;
use crate::users::NewUser;

const RESET_MESSAGE: &str = "If your email is registered, you will receive a reset link";

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::Validation(e.body_text()))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let users = state.users.list().await?;
    tracing::info!(count = users.len(), "Retrieved users");

    Ok(Json(json!({
        "success": true,
        "count": users.len(),
        "users": users,
    })))
}

/// Development helper creating a throwaway user.
pub async fn create_test_user(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<Value>)> {
    if state.config.environment.is_production() {
        return Err(ApiError::Forbidden(
            "This endpoint is only available in development mode".to_string(),
        ));
    }

    let stamp = chrono::Utc::now().timestamp_millis();
    let user = state
        .users
        .create(NewUser {
            username: format!("test_user_{stamp}"),
            email: format!("test_{stamp}@example.com"),
            password: "password123".to_string(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Test user created successfully",
            "user": user,
        })),
    ))
}

pub async fn register(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let input = body(payload)?;
    input.validate().map_err(ApiError::Validation)?;

    tracing::info!(request_id = %request_id, "Registering user");
    let user = state.users.create(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "user": user,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let input = body(payload)?;
    if input.email.trim().is_empty() || input.password.is_empty() {
        return Err(ApiError::Validation(
            "Missing required fields: email and password are required".to_string(),
        ));
    }

    match state.users.authenticate(&input.email, &input.password).await? {
        Some(user) => {
            tracing::info!(request_id = %request_id, user_id = user.id, "User logged in");
            Ok(Json(json!({
                "success": true,
                "message": "Login successful",
                "user": user,
            })))
        }
        None => {
            tracing::info!(request_id = %request_id, "Login rejected");
            Err(ApiError::Unauthorized("Invalid credentials".to_string()))
        }
    }
}

/// Always answers with the same message so registered emails can't be probed.
pub async fn forgot_password(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let input = body(payload)?;
    if input.email.trim().is_empty() {
        return Err(ApiError::Validation("Email is required".to_string()));
    }

    if let Err(e) = state.users.find_by_email(&input.email).await {
        tracing::warn!(request_id = %request_id, error = %e, "Password reset lookup failed");
    }

    Ok(Json(json!({
        "success": true,
        "message": RESET_MESSAGE,
    })))
}
