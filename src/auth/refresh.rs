//! Opaque refresh tokens and their persisted lifecycle.
//!
//! Token values are 32 bytes from the OS CSPRNG, hex encoded. They are bearer
//! capabilities looked up by exact match, not parsed.

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use rand::{RngCore, rngs::OsRng};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};
use uuid::Uuid;

use super::AuthError;
use crate::store::{AuthStore, InsertOutcome, RefreshTokenRecord, RevokeOutcome};

const TOKEN_BYTES: usize = 32;
const MINT_ATTEMPTS: usize = 3;

/// Server-visible state of a refresh token at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    Expired,
    Revoked,
}

impl RefreshTokenRecord {
    /// Revocation wins over expiry so audits see the explicit action.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.revoked_at.is_some() {
            RefreshTokenState::Revoked
        } else if now >= self.expires_at {
            RefreshTokenState::Expired
        } else {
            RefreshTokenState::Active
        }
    }
}

/// Generate a new refresh token value.
///
/// # Errors
///
/// Returns `Internal` if the OS random source fails.
pub fn mint() -> Result<String, AuthError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh token")
        .map_err(AuthError::Internal)?;
    Ok(hex::encode(bytes))
}

#[derive(Clone)]
pub struct RefreshTokens {
    store: Arc<dyn AuthStore>,
}

impl RefreshTokens {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Mint and persist a token for `user_id`, active for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `Internal` on store or randomness failure, or if no unique value
    /// could be produced.
    pub async fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<String, AuthError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(AuthError::internal)?;

        for _ in 0..MINT_ATTEMPTS {
            let created_at = Utc::now();
            let record = RefreshTokenRecord {
                token: mint()?,
                user_id,
                created_at,
                expires_at: created_at + ttl,
                revoked_at: None,
            };
            match self
                .store
                .create_refresh_token(&record)
                .await
                .map_err(AuthError::Internal)?
            {
                InsertOutcome::Inserted => return Ok(record.token),
                InsertOutcome::Duplicate => warn!("refresh token collision, minting again"),
            }
        }

        Err(AuthError::internal(anyhow!(
            "failed to generate unique refresh token"
        )))
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown value and `Internal` on store failure.
    pub async fn lookup(&self, token: &str) -> Result<RefreshTokenRecord, AuthError> {
        self.store
            .lookup_refresh_token(token)
            .await
            .map_err(AuthError::Internal)?
            .ok_or(AuthError::NotFound)
    }

    /// Look up a token and require it to be active now.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Revoked` or `Expired` for unusable tokens.
    pub async fn lookup_active(&self, token: &str) -> Result<RefreshTokenRecord, AuthError> {
        let record = self.lookup(token).await?;
        match record.state(Utc::now()) {
            RefreshTokenState::Active => Ok(record),
            RefreshTokenState::Revoked => Err(AuthError::Revoked),
            RefreshTokenState::Expired => Err(AuthError::Expired),
        }
    }

    /// Mark a token revoked. Revoking twice succeeds and keeps the first timestamp.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown value and `Internal` on store failure.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        match self
            .store
            .revoke_refresh_token(token, Utc::now())
            .await
            .map_err(AuthError::Internal)?
        {
            RevokeOutcome::Revoked => Ok(()),
            RevokeOutcome::AlreadyRevoked => {
                debug!("refresh token was already revoked");
                Ok(())
            }
            RevokeOutcome::NotFound => Err(AuthError::NotFound),
        }
    }

    /// # Errors
    ///
    /// Returns `Internal` on store failure.
    pub async fn purge_all(&self) -> Result<u64, AuthError> {
        self.store
            .purge_all_refresh_tokens()
            .await
            .map_err(AuthError::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use anyhow::Result;
    use std::collections::HashSet;

    const SIXTY_DAYS: Duration = Duration::from_secs(60 * 24 * 60 * 60);

    fn tokens() -> (Arc<MemoryStore>, RefreshTokens) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), RefreshTokens::new(store))
    }

    #[test]
    fn mint_is_64_hex_chars() -> Result<()> {
        let token = mint()?;
        assert_eq!(token.len(), 64);
        assert_eq!(hex::decode(&token)?.len(), TOKEN_BYTES);
        Ok(())
    }

    #[test]
    fn mint_does_not_repeat() -> Result<()> {
        let mut seen = HashSet::new();
        for _ in 0..256 {
            assert!(seen.insert(mint()?));
        }
        Ok(())
    }

    #[test]
    fn state_prefers_revoked_over_expired() {
        let now = Utc::now();
        let mut record = RefreshTokenRecord {
            token: "t".to_string(),
            user_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(10),
            revoked_at: None,
        };
        assert_eq!(record.state(now), RefreshTokenState::Active);
        assert_eq!(
            record.state(now + chrono::Duration::seconds(10)),
            RefreshTokenState::Expired
        );
        record.revoked_at = Some(now);
        assert_eq!(record.state(now), RefreshTokenState::Revoked);
        assert_eq!(
            record.state(now + chrono::Duration::seconds(60)),
            RefreshTokenState::Revoked
        );
    }

    #[tokio::test]
    async fn issue_persists_active_token() -> Result<()> {
        let (store, tokens) = tokens();
        let user_id = Uuid::new_v4();
        let before = Utc::now();
        let token = tokens.issue(user_id, SIXTY_DAYS).await?;

        let record = tokens.lookup_active(&token).await?;
        assert_eq!(record.user_id, user_id);
        assert!(record.revoked_at.is_none());
        let lifetime = record.expires_at - before;
        assert!(lifetime >= chrono::Duration::days(60));
        assert!(lifetime < chrono::Duration::days(60) + chrono::Duration::seconds(5));
        assert_eq!(store.refresh_token_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_blocks_use() -> Result<()> {
        let (_store, tokens) = tokens();
        let token = tokens.issue(Uuid::new_v4(), SIXTY_DAYS).await?;

        tokens.revoke(&token).await?;
        let first = tokens.lookup(&token).await?.revoked_at;
        tokens.revoke(&token).await?;
        assert_eq!(tokens.lookup(&token).await?.revoked_at, first);

        assert!(matches!(
            tokens.lookup_active(&token).await,
            Err(AuthError::Revoked)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_tokens_are_not_found() {
        let (_store, tokens) = tokens();
        assert!(matches!(
            tokens.lookup("deadbeef").await,
            Err(AuthError::NotFound)
        ));
        assert!(matches!(
            tokens.revoke("deadbeef").await,
            Err(AuthError::NotFound)
        ));
    }

    #[tokio::test]
    async fn zero_ttl_token_is_expired() -> Result<()> {
        let (_store, tokens) = tokens();
        let token = tokens.issue(Uuid::new_v4(), Duration::ZERO).await?;
        assert!(matches!(
            tokens.lookup_active(&token).await,
            Err(AuthError::Expired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn purge_all_removes_everything() -> Result<()> {
        let (store, tokens) = tokens();
        tokens.issue(Uuid::new_v4(), SIXTY_DAYS).await?;
        tokens.issue(Uuid::new_v4(), SIXTY_DAYS).await?;
        assert_eq!(tokens.purge_all().await?, 2);
        assert_eq!(store.refresh_token_count().await, 0);
        Ok(())
    }
}
