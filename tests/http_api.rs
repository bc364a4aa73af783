use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chirpy::auth::{AuthConfig, Platform, SessionManager};
use chirpy::store::MemoryStore;
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const POLKA_KEY: &str = "f271c81ff7084ee5b99a5091b42d486e";

fn app(platform: Platform) -> Result<Router> {
    let config = AuthConfig::new(
        SecretString::from("http-signing-secret"),
        SecretString::from(POLKA_KEY),
        platform,
    )?
    .with_hash_cost(4)?;
    let sessions = Arc::new(SessionManager::new(Arc::new(MemoryStore::new()), config));
    Ok(chirpy::chirpy::app(sessions))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    authorization: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

fn field<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .with_context(|| format!("missing {key}"))
}

async fn signup_and_login(app: &Router, email: &str, password: &str) -> Result<Value> {
    let credentials = json!({"email": email, "password": password});
    let (status, _) = send(app, Method::POST, "/api/users", None, Some(credentials.clone())).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(app, Method::POST, "/api/login", None, Some(credentials)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(body)
}

#[tokio::test]
async fn login_returns_profile_and_tokens() -> Result<()> {
    let app = app(Platform::Dev)?;
    let body = signup_and_login(&app, "walt@breakingbad.com", "123456").await?;

    assert_eq!(field(&body, "email")?, "walt@breakingbad.com");
    assert_eq!(body.get("is_chirpy_red"), Some(&Value::Bool(false)));
    assert_eq!(field(&body, "refresh_token")?.len(), 64);
    assert_eq!(field(&body, "token")?.split('.').count(), 3);
    assert!(body.get("hashed_password").is_none());
    Ok(())
}

#[tokio::test]
async fn auth_failures_share_one_response() -> Result<()> {
    let app = app(Platform::Dev)?;
    signup_and_login(&app, "walt@breakingbad.com", "123456").await?;

    let unknown = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"email": "nobody@example.com", "password": "123456"})),
    )
    .await?;
    let wrong = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"email": "walt@breakingbad.com", "password": "wrong"})),
    )
    .await?;
    let bad_token = send(&app, Method::POST, "/api/refresh", Some("Bearer nope"), None).await?;
    let no_header = send(&app, Method::POST, "/api/refresh", None, None).await?;

    for (status, body) in [&unknown, &wrong, &bad_token, &no_header] {
        assert_eq!(*status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, &unknown.1);
    }
    Ok(())
}

#[tokio::test]
async fn refresh_then_revoke() -> Result<()> {
    let app = app(Platform::Dev)?;
    let login = signup_and_login(&app, "walt@breakingbad.com", "123456").await?;
    let refresh = format!("Bearer {}", field(&login, "refresh_token")?);

    let (status, body) = send(&app, Method::POST, "/api/refresh", Some(refresh.as_str()), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field(&body, "token")?.split('.').count(), 3);

    let (status, body) = send(&app, Method::POST, "/api/revoke", Some(refresh.as_str()), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::POST, "/api/refresh", Some(refresh.as_str()), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::POST, "/api/revoke", Some(refresh.as_str()), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn duplicate_signup_conflicts() -> Result<()> {
    let app = app(Platform::Dev)?;
    signup_and_login(&app, "walt@breakingbad.com", "123456").await?;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"email": "Walt@BreakingBad.com", "password": "other"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"email": "not-an-email", "password": "other"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"email": "jesse@breakingbad.com", "password": "x".repeat(73)})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn update_user_requires_identity_token() -> Result<()> {
    let app = app(Platform::Dev)?;
    let login = signup_and_login(&app, "walt@breakingbad.com", "123456").await?;
    let update = json!({"email": "heisenberg@breakingbad.com", "password": "losPollos"});

    let (status, _) = send(&app, Method::PUT, "/api/users", None, Some(update.clone())).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A refresh token is not an identity token.
    let refresh = format!("Bearer {}", field(&login, "refresh_token")?);
    let (status, _) =
        send(&app, Method::PUT, "/api/users", Some(refresh.as_str()), Some(update.clone())).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let identity = format!("Bearer {}", field(&login, "token")?);
    let (status, body) = send(&app, Method::PUT, "/api/users", Some(identity.as_str()), Some(update)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field(&body, "email")?, "heisenberg@breakingbad.com");
    assert_eq!(field(&body, "id")?, field(&login, "id")?);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"email": "heisenberg@breakingbad.com", "password": "losPollos"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn webhook_requires_api_key_and_upgrades_user() -> Result<()> {
    let app = app(Platform::Dev)?;
    let login = signup_and_login(&app, "walt@breakingbad.com", "123456").await?;
    let user_id = field(&login, "id")?.to_string();
    let event = json!({"event": "user.upgraded", "data": {"user_id": user_id}});
    let api_key = format!("ApiKey {POLKA_KEY}");

    let (status, _) =
        send(&app, Method::POST, "/api/polka/webhooks", None, Some(event.clone())).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/polka/webhooks",
        Some("ApiKey wrong"),
        Some(event.clone()),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/polka/webhooks",
        Some(api_key.as_str()),
        Some(json!({"event": "user.payment_failed"})),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/polka/webhooks",
        Some(api_key.as_str()),
        Some(event),
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({"email": "walt@breakingbad.com", "password": "123456"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("is_chirpy_red"), Some(&Value::Bool(true)));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/polka/webhooks",
        Some(api_key.as_str()),
        Some(json!({
            "event": "user.upgraded",
            "data": {"user_id": "3311741c-680c-4546-99f3-fc9efac2036c"}
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn reset_only_on_dev() -> Result<()> {
    let production = app(Platform::Production)?;
    let (status, _) = send(&production, Method::POST, "/admin/reset", None, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let dev = app(Platform::Dev)?;
    let login = signup_and_login(&dev, "walt@breakingbad.com", "123456").await?;
    let (status, body) = send(&dev, Method::POST, "/admin/reset", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("users_deleted").and_then(Value::as_u64), Some(1));

    let refresh = format!("Bearer {}", field(&login, "refresh_token")?);
    let (status, _) = send(&dev, Method::POST, "/api/refresh", Some(refresh.as_str()), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn health_and_request_id() -> Result<()> {
    let app = app(Platform::Production)?;
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/healthz").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("X-App"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/healthz")
                .header("x-request-id", "client-supplied")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("client-supplied")
    );
    Ok(())
}
