//! Payment-provider webhook, authenticated with the `ApiKey` scheme.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    error_response, json_error, missing_payload,
    types::{ErrorResponse, USER_UPGRADED_EVENT, WebhookRequest},
};
use crate::auth::SessionManager;

#[utoipa::path(
    post,
    path = "/api/polka/webhooks",
    request_body = WebhookRequest,
    params(
        ("Authorization" = String, Header, description = "ApiKey <key>")
    ),
    responses(
        (status = 204, description = "Event processed or ignored"),
        (status = 400, description = "Missing payload", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "webhooks"
)]
#[instrument(skip_all)]
pub async fn polka_webhook(
    headers: HeaderMap,
    sessions: Extension<Arc<SessionManager>>,
    payload: Option<Json<WebhookRequest>>,
) -> impl IntoResponse {
    if let Err(err) = sessions.authenticate_privileged(&headers) {
        return error_response(&err);
    }
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    if request.event != USER_UPGRADED_EVENT {
        debug!(event = %request.event, "ignoring webhook event");
        return StatusCode::NO_CONTENT.into_response();
    }
    let Some(data) = request.data else {
        return json_error(StatusCode::BAD_REQUEST, "Missing user_id");
    };

    match sessions.upgrade_user(data.user_id).await {
        Ok(true) => {
            info!(user_id = %data.user_id, "user upgraded");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => json_error(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => error_response(&err),
    }
}
