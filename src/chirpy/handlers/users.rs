//! Account endpoints: create, login, credential update.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    error_response, missing_payload,
    types::{CredentialsRequest, ErrorResponse, LoginResponse, UserResponse},
};
use crate::auth::SessionManager;

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn create_user(
    sessions: Extension<Arc<SessionManager>>,
    payload: Option<Json<CredentialsRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match sessions.register(&request.email, &request.password).await {
        Ok(profile) => (StatusCode::CREATED, Json(UserResponse::from(profile))).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Missing payload", body = ErrorResponse),
        (status = 401, description = "Incorrect email or password", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    sessions: Extension<Arc<SessionManager>>,
    payload: Option<Json<CredentialsRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match sessions.login(&request.email, &request.password).await {
        Ok(session) => (StatusCode::OK, Json(LoginResponse::from(session))).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    put,
    path = "/api/users",
    request_body = CredentialsRequest,
    params(
        ("Authorization" = String, Header, description = "Bearer identity token")
    ),
    responses(
        (status = 200, description = "Credentials updated", body = UserResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "users"
)]
#[instrument(skip_all)]
pub async fn update_user(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
    payload: Option<Json<CredentialsRequest>>,
) -> impl IntoResponse {
    // Identify before looking at the body so anonymous callers always get 401.
    let user_id = match sessions.identify(&headers) {
        Ok(user_id) => user_id,
        Err(err) => return error_response(&err),
    };
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match sessions
        .update_credentials(user_id, &request.email, &request.password)
        .await
    {
        Ok(profile) => (StatusCode::OK, Json(UserResponse::from(profile))).into_response(),
        Err(err) => error_response(&err),
    }
}
