//! Pull credentials out of the `Authorization` header.
//!
//! Accepted shapes are `Bearer <token>` and `ApiKey <key>`: exact, case-sensitive
//! scheme, at least one whitespace character, then a single token. This module
//! only judges presence and shape; whether the token is any good is decided by the
//! signer or the refresh-token store.

use axum::http::{HeaderMap, header::AUTHORIZATION};

use super::AuthError;

pub const BEARER_SCHEME: &str = "Bearer";
pub const API_KEY_SCHEME: &str = "ApiKey";

/// # Errors
///
/// `MissingCredential` when the header is absent or carries no token,
/// `MalformedCredential` when it uses another scheme or is not parsable.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    scheme_credential(headers, BEARER_SCHEME)
}

/// # Errors
///
/// Same as [`bearer_token`], for the `ApiKey` scheme.
pub fn api_key(headers: &HeaderMap) -> Result<String, AuthError> {
    scheme_credential(headers, API_KEY_SCHEME)
}

fn scheme_credential(headers: &HeaderMap, scheme: &str) -> Result<String, AuthError> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let Some(value) = values.next() else {
        return Err(AuthError::MissingCredential);
    };
    if values.next().is_some() {
        return Err(AuthError::MalformedCredential);
    }

    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedCredential)?
        .trim_start();
    if value.trim().is_empty() {
        return Err(AuthError::MissingCredential);
    }

    let rest = value
        .strip_prefix(scheme)
        .ok_or(AuthError::MalformedCredential)?;
    let credential = rest.trim();
    if credential.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    // `BearerXYZ` must not be read as token `XYZ`.
    if !rest.starts_with(char::is_whitespace) {
        return Err(AuthError::MalformedCredential);
    }
    if credential.contains(char::is_whitespace) {
        return Err(AuthError::MalformedCredential);
    }

    Ok(credential.to_string())
}
