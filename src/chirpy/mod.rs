#![allow(clippy::needless_for_each)]

use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa::OpenApi;

use crate::auth::SessionManager;

pub mod handlers;

use handlers::{admin, health, tokens, types, users, webhooks};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

const REQUEST_ID: &str = "x-request-id";

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        users::create_user,
        users::update_user,
        users::login,
        tokens::refresh,
        tokens::revoke,
        webhooks::polka_webhook,
        admin::reset,
    ),
    components(
        schemas(
            health::Health,
            types::CredentialsRequest,
            types::UserResponse,
            types::LoginResponse,
            types::TokenResponse,
            types::WebhookRequest,
            types::WebhookData,
            types::ResetResponse,
            types::ErrorResponse,
        )
    ),
    tags(
        (name = "auth", description = "Login and token lifecycle"),
        (name = "users", description = "Accounts"),
        (name = "webhooks", description = "Privileged callbacks"),
        (name = "admin", description = "Development-only maintenance"),
        (name = "health", description = "Liveness"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router around a session manager.
pub fn app(sessions: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/api/healthz", get(health::health))
        .route(
            "/api/users",
            post(users::create_user).put(users::update_user),
        )
        .route("/api/login", post(users::login))
        .route("/api/refresh", post(tokens::refresh))
        .route("/api/revoke", post(tokens::revoke))
        .route("/api/polka/webhooks", post(webhooks::polka_webhook))
        .route("/admin/reset", post(admin::reset))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(sessions)),
        )
}

/// Serve until Ctrl-C.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails
pub async fn new(port: u16, sessions: Arc<SessionManager>) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app(sessions).into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// Headers are not recorded: they carry credentials.
fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    info_span!(
        "http.request",
        method = %request.method(),
        path = request.uri().path(),
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_auth_routes() {
        let doc = openapi();
        for path in [
            "/api/login",
            "/api/refresh",
            "/api/revoke",
            "/api/users",
            "/api/polka/webhooks",
            "/admin/reset",
            "/api/healthz",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }

    #[test]
    fn commit_hash_is_never_empty() {
        assert!(!GIT_COMMIT_HASH.is_empty());
    }
}
