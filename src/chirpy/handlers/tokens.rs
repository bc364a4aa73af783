//! Refresh-token endpoints. Both take the refresh token as a bearer credential.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    error_response,
    types::{ErrorResponse, TokenResponse},
};
use crate::auth::SessionManager;

#[utoipa::path(
    post,
    path = "/api/refresh",
    params(
        ("Authorization" = String, Header, description = "Bearer refresh token")
    ),
    responses(
        (status = 200, description = "New identity token", body = TokenResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
) -> impl IntoResponse {
    match sessions.refresh(&headers).await {
        Ok(token) => (StatusCode::OK, Json(TokenResponse { token })).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/revoke",
    params(
        ("Authorization" = String, Header, description = "Bearer refresh token")
    ),
    responses(
        (status = 204, description = "Refresh token revoked"),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn revoke(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
) -> impl IntoResponse {
    match sessions.revoke(&headers).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}
