//! Identity tokens: compact HS256 JWS with registered claims only.
//!
//! Tokens are stateless. There is no revocation list; a token stops working when
//! `exp` passes, so lifetimes stay short and new ones are minted from refresh
//! tokens.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const ISSUER: &str = "chirpy";
pub const ALGORITHM: &str = "HS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityTokenHeader {
    pub alg: String,
    #[serde(default)]
    pub typ: String,
}

impl IdentityTokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityTokenClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("token expired")]
    Expired,
    #[error("subject is not a valid identity")]
    MalformedSubject,
    #[error("signing secret is empty")]
    EmptyKey,
    #[error("invalid token ttl")]
    InvalidTtl,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn mac(secret: &[u8]) -> Result<HmacSha256, Error> {
    if secret.is_empty() {
        return Err(Error::EmptyKey);
    }
    HmacSha256::new_from_slice(secret).map_err(|_| Error::EmptyKey)
}

pub(crate) fn sign_claims(claims: &IdentityTokenClaims, secret: &[u8]) -> Result<String, Error> {
    let header_b64 = b64e_json(&IdentityTokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Issue an identity token for `user_id` valid for `ttl` from now.
///
/// # Errors
///
/// Returns an error if the secret is empty, the ttl does not fit in the claims, or
/// the claims cannot be encoded.
pub fn issue(user_id: Uuid, secret: &[u8], ttl: Duration) -> Result<String, Error> {
    issue_at(user_id, secret, ttl, Utc::now().timestamp())
}

/// Same as [`issue`] with an explicit clock.
///
/// # Errors
///
/// See [`issue`].
pub fn issue_at(
    user_id: Uuid,
    secret: &[u8],
    ttl: Duration,
    now_unix_seconds: i64,
) -> Result<String, Error> {
    let ttl_seconds = i64::try_from(ttl.as_secs()).map_err(|_| Error::InvalidTtl)?;
    let exp = now_unix_seconds
        .checked_add(ttl_seconds)
        .ok_or(Error::InvalidTtl)?;
    let claims = IdentityTokenClaims {
        iss: ISSUER.to_string(),
        sub: user_id.to_string(),
        iat: now_unix_seconds,
        exp,
    };
    sign_claims(&claims, secret)
}

/// Validate an identity token and return the identity it names.
///
/// # Errors
///
/// Returns an error if:
/// - the token is not three base64url segments of JSON,
/// - the header names any algorithm other than `HS256`,
/// - the MAC does not verify under `secret`,
/// - the issuer is not ours or `exp` is not in the future,
/// - the subject is not a UUID.
pub fn validate(token: &str, secret: &[u8]) -> Result<Uuid, Error> {
    validate_at(token, secret, Utc::now().timestamp())
}

/// Same as [`validate`] with an explicit clock.
///
/// # Errors
///
/// See [`validate`].
pub fn validate_at(token: &str, secret: &[u8], now_unix_seconds: i64) -> Result<Uuid, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    // The algorithm is pinned; the header never selects it.
    let header: IdentityTokenHeader = b64d_json(header_b64)?;
    if header.alg != ALGORITHM {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = mac(secret)?;
    mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: IdentityTokenClaims = b64d_json(claims_b64)?;
    if claims.iss != ISSUER {
        return Err(Error::InvalidIssuer);
    }
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Uuid::parse_str(&claims.sub).map_err(|_| Error::MalformedSubject)
}
