//! Login, refresh, revoke and per-request identification.
//!
//! Flow Overview:
//! - Login verifies the password and returns a one-hour identity token plus a
//!   persisted 60-day refresh token.
//! - Protected requests present the identity token; `identify` validates it
//!   without touching the store.
//! - Refresh presents the refresh token and receives a new identity token. The
//!   refresh token itself is not rotated and stays usable until it expires or is
//!   revoked.
//! - Revoke marks the refresh token revoked; from then on it refreshes nothing.
//!
//! Concurrent logins for one user produce independent refresh tokens. The manager
//! holds no mutable state; everything durable lives behind [`AuthStore`].

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use axum::http::HeaderMap;

use super::{AuthConfig, AuthError, credentials, jwt, refresh::RefreshTokens};
use crate::store::{AuthStore, CreateUserOutcome, UpdateUserOutcome, UserRecord};

/// Public fields of an account. Never includes the hashed secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_chirpy_red: bool,
}

impl From<UserRecord> for Profile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            created_at: record.created_at,
            updated_at: record.updated_at,
            is_chirpy_red: record.is_chirpy_red,
        }
    }
}

/// Result of a successful login.
#[derive(Clone)]
pub struct Session {
    pub identity_token: String,
    pub refresh_token: String,
    pub profile: Profile,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity_token", &"***")
            .field("refresh_token", &"***")
            .field("profile", &self.profile)
            .finish()
    }
}

// Verified against when the email is unknown, so both login failures cost one
// bcrypt comparison.
const UNKNOWN_ACCOUNT_SECRET: &str = "chirpy-unknown-account";

const API_KEY_DIGEST_LABEL: &[u8] = b"chirpy-api-key";

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Check a presented API key against the expected one.
///
/// # Errors
///
/// `MissingCredential`/`MalformedCredential` from header parsing, `Mismatch` when
/// the key is wrong.
pub fn authenticate_privileged(
    headers: &HeaderMap,
    expected_key: &SecretString,
) -> Result<(), AuthError> {
    let presented = credentials::api_key(headers)?;
    if keys_match(
        presented.as_bytes(),
        expected_key.expose_secret().as_bytes(),
    ) {
        Ok(())
    } else {
        Err(AuthError::Mismatch)
    }
}

// Both keys are reduced to fixed-size digests; `verify_slice` compares them in
// constant time.
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    let digest = |value: &[u8]| {
        Hmac::<Sha256>::new_from_slice(API_KEY_DIGEST_LABEL).map(|mut mac| {
            mac.update(value);
            mac
        })
    };
    let (Ok(presented), Ok(expected)) = (digest(presented), digest(expected)) else {
        return false;
    };
    presented
        .verify_slice(&expected.finalize().into_bytes())
        .is_ok()
}

/// Require the identified principal to own the resource it is about to mutate.
///
/// # Errors
///
/// Returns `Forbidden` when they differ.
pub fn authorize_owner(principal: Uuid, owner: Uuid) -> Result<(), AuthError> {
    if principal == owner {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

pub struct SessionManager {
    store: Arc<dyn AuthStore>,
    refresh_tokens: RefreshTokens,
    config: AuthConfig,
    unknown_account_hash: OnceCell<String>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn AuthStore>, config: AuthConfig) -> Self {
        Self {
            refresh_tokens: RefreshTokens::new(store.clone()),
            store,
            config,
            unknown_account_hash: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.config.hasher();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(AuthError::internal)?
    }

    async fn verify_password(&self, password: &str, hashed: String) -> Result<(), AuthError> {
        let hasher = self.config.hasher();
        let password = password.to_owned();
        match tokio::task::spawn_blocking(move || hasher.verify(&password, &hashed)).await {
            Ok(result) => result,
            Err(err) => {
                warn!("password verification task failed: {err}");
                Err(AuthError::Mismatch)
            }
        }
    }

    // Pays the same bcrypt cost as a real comparison and always fails.
    async fn reject_unknown_account(&self, password: &str) -> AuthError {
        let hashed = self
            .unknown_account_hash
            .get_or_try_init(|| self.hash_password(UNKNOWN_ACCOUNT_SECRET))
            .await;
        match hashed {
            Ok(hashed) => {
                let _ = self.verify_password(password, hashed.clone()).await;
            }
            Err(err) => warn!("failed to prepare unknown-account hash: {err}"),
        }
        AuthError::Mismatch
    }

    fn issue_identity_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        jwt::issue(
            user_id,
            self.config.signing_secret(),
            self.config.identity_token_ttl(),
        )
        .map_err(AuthError::internal)
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed email or an empty or over-long password,
    /// `EmailTaken` for a
    /// duplicate, `Internal` on hashing or store failure.
    #[instrument(skip_all)]
    pub async fn register(&self, email: &str, password: &str) -> Result<Profile, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidInput("invalid email"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty"));
        }

        let hashed = self.hash_password(password).await?;
        match self
            .store
            .create_secret_record(&email, &hashed)
            .await
            .map_err(AuthError::Internal)?
        {
            CreateUserOutcome::Created(record) => {
                info!(user_id = %record.id, "account created");
                Ok(record.into())
            }
            CreateUserOutcome::Conflict => Err(AuthError::EmailTaken),
        }
    }

    /// Password login.
    ///
    /// Unknown email and wrong password fail identically with `Mismatch`.
    ///
    /// # Errors
    ///
    /// `Mismatch` on bad credentials, `Internal` on store or signing failure.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let Some(record) = self
            .store
            .secret_record_by_email(&email)
            .await
            .map_err(AuthError::Internal)?
        else {
            debug!("login rejected: unknown email");
            return Err(self.reject_unknown_account(password).await);
        };

        self.verify_password(password, record.hashed_password.clone())
            .await
            .inspect_err(|err| debug!(user_id = %record.id, reason = err.kind(), "login rejected"))?;

        let identity_token = self.issue_identity_token(record.id)?;
        let refresh_token = self
            .refresh_tokens
            .issue(record.id, self.config.refresh_token_ttl())
            .await?;

        info!(user_id = %record.id, "login succeeded");

        Ok(Session {
            identity_token,
            refresh_token,
            profile: record.into(),
        })
    }

    /// Resolve the caller from a bearer identity token. Pure CPU, no store access.
    ///
    /// # Errors
    ///
    /// Any credential or token failure.
    pub fn identify(&self, headers: &HeaderMap) -> Result<Uuid, AuthError> {
        let token = credentials::bearer_token(headers)?;
        jwt::validate(&token, self.config.signing_secret())
            .map_err(AuthError::from)
            .inspect_err(|err| debug!(reason = err.kind(), "identity token rejected"))
    }

    /// Mint a new identity token from a bearer refresh token.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Expired` or `Revoked` for unusable refresh tokens.
    #[instrument(skip_all)]
    pub async fn refresh(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let token = credentials::bearer_token(headers)?;
        let record = self
            .refresh_tokens
            .lookup_active(&token)
            .await
            .inspect_err(|err| debug!(reason = err.kind(), "refresh rejected"))?;

        self.issue_identity_token(record.user_id)
    }

    /// Revoke the bearer refresh token.
    ///
    /// Revocation is recorded once. Presenting a token that is already revoked
    /// leaves it untouched and fails like any other dead credential.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown tokens, `Revoked` for already revoked ones.
    #[instrument(skip_all)]
    pub async fn revoke(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let token = credentials::bearer_token(headers)?;
        let record = self.refresh_tokens.lookup(&token).await?;
        if record.revoked_at.is_some() {
            debug!(user_id = %record.user_id, "refresh token already revoked");
            return Err(AuthError::Revoked);
        }

        self.refresh_tokens.revoke(&token).await?;
        info!(user_id = %record.user_id, "refresh token revoked");
        Ok(())
    }

    /// Check the configured privileged API key.
    ///
    /// # Errors
    ///
    /// See [`authenticate_privileged`].
    pub fn authenticate_privileged(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        authenticate_privileged(headers, self.config.api_key())
            .inspect_err(|err| debug!(reason = err.kind(), "api key rejected"))
    }

    /// Change email and password of a caller already resolved by [`Self::identify`].
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `EmailTaken`, or `NotFound` when the identity names a user
    /// that no longer exists.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn update_credentials(
        &self,
        user_id: Uuid,
        email: &str,
        password: &str,
    ) -> Result<Profile, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidInput("invalid email"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty"));
        }

        let hashed = self.hash_password(password).await?;
        match self
            .store
            .update_secret_record(user_id, &email, &hashed)
            .await
            .map_err(AuthError::Internal)?
        {
            UpdateUserOutcome::Updated(record) => {
                info!(user_id = %record.id, "credentials updated");
                Ok(record.into())
            }
            UpdateUserOutcome::Conflict => Err(AuthError::EmailTaken),
            UpdateUserOutcome::NotFound => Err(AuthError::NotFound),
        }
    }

    /// Mark a user premium. Returns `false` for an unknown user.
    ///
    /// # Errors
    ///
    /// `Internal` on store failure.
    pub async fn upgrade_user(&self, user_id: Uuid) -> Result<bool, AuthError> {
        self.store
            .upgrade_user(user_id)
            .await
            .map_err(AuthError::Internal)
    }

    /// Delete every refresh token and every user. Only on the `dev` platform.
    ///
    /// # Errors
    ///
    /// `Forbidden` outside `dev`, `Internal` on store failure.
    #[instrument(skip_all)]
    pub async fn reset(&self) -> Result<u64, AuthError> {
        if !self.config.platform().allows_destructive_operations() {
            warn!(platform = %self.config.platform(), "reset refused");
            return Err(AuthError::Forbidden);
        }

        let tokens = self.refresh_tokens.purge_all().await?;
        let users = self
            .store
            .purge_all_users()
            .await
            .map_err(AuthError::Internal)?;
        info!(tokens, users, "store reset");
        Ok(users)
    }
}
