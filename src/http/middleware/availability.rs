//! Availability gate middleware.
//! Rejects writes with 503 while the database is down.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::resilience::{Admission, OperationKind};

pub async fn availability_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let kind = OperationKind::classify(req.method(), req.uri().path());

    match state.datastore.gate().admit(kind).await {
        Admission::Allow => next.run(req).await,
        Admission::Reject => {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                "Database unavailable, rejecting request"
            );
            ApiError::Unavailable.into_response()
        }
    }
}
