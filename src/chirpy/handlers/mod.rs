pub mod admin;
pub mod health;
pub mod tokens;
pub mod types;
pub mod users;
pub mod webhooks;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use self::types::ErrorResponse;
use crate::auth::{AuthError, Outcome};

/// Map a core failure to its public HTTP shape.
///
/// Every unauthorized kind gets the same body so callers cannot tell which check
/// rejected them.
pub(crate) fn error_response(err: &AuthError) -> Response {
    let (status, message) = match err.outcome() {
        Outcome::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        Outcome::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
        Outcome::Conflict => (StatusCode::CONFLICT, "Email already registered".to_string()),
        Outcome::BadRequest => (StatusCode::BAD_REQUEST, err.to_string()),
        Outcome::Internal => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        ),
    };

    if let AuthError::Internal(source) = err {
        error!("request failed: {source:#}");
    } else {
        debug!(reason = err.kind(), status = status.as_u16(), "request rejected");
    }

    json_error(status, message)
}

pub(crate) fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub(crate) fn missing_payload() -> Response {
    json_error(StatusCode::BAD_REQUEST, "Missing payload")
}
