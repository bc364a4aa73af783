use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::instrument;

use super::{
    error_response,
    types::{ErrorResponse, ResetResponse},
};
use crate::auth::SessionManager;

#[utoipa::path(
    post,
    path = "/admin/reset",
    responses(
        (status = 200, description = "All users and refresh tokens deleted", body = ResetResponse),
        (status = 403, description = "Only allowed on the dev platform", body = ErrorResponse)
    ),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn reset(sessions: Extension<Arc<SessionManager>>) -> impl IntoResponse {
    match sessions.reset().await {
        Ok(users_deleted) => (StatusCode::OK, Json(ResetResponse { users_deleted })).into_response(),
        Err(err) => error_response(&err),
    }
}
