//! In-process store for tests and local development. Nothing survives a restart.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AuthStore, CreateUserOutcome, InsertOutcome, RefreshTokenRecord, RevokeOutcome,
    UpdateUserOutcome, UserRecord,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted refresh tokens, revoked or not.
    pub async fn refresh_token_count(&self) -> usize {
        self.tables.lock().await.refresh_tokens.len()
    }

    /// Refresh tokens held by `user_id`.
    pub async fn refresh_tokens_for(&self, user_id: Uuid) -> Vec<RefreshTokenRecord> {
        self.tables
            .lock()
            .await
            .refresh_tokens
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn secret_record_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_secret_record(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> Result<CreateUserOutcome> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == email) {
            return Ok(CreateUserOutcome::Conflict);
        }
        let now = Utc::now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            created_at: now,
            updated_at: now,
            is_chirpy_red: false,
        };
        tables.users.insert(user.id, user.clone());
        Ok(CreateUserOutcome::Created(user))
    }

    async fn update_secret_record(
        &self,
        user_id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> Result<UpdateUserOutcome> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .values()
            .any(|u| u.email == email && u.id != user_id)
        {
            return Ok(UpdateUserOutcome::Conflict);
        }
        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(UpdateUserOutcome::NotFound);
        };
        user.email = email.to_string();
        user.hashed_password = hashed_password.to_string();
        user.updated_at = Utc::now();
        Ok(UpdateUserOutcome::Updated(user.clone()))
    }

    async fn upgrade_user(&self, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.get_mut(&user_id).is_some_and(|user| {
            user.is_chirpy_red = true;
            user.updated_at = Utc::now();
            true
        }))
    }

    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<InsertOutcome> {
        let mut tables = self.tables.lock().await;
        if tables.refresh_tokens.contains_key(&record.token) {
            return Ok(InsertOutcome::Duplicate);
        }
        tables
            .refresh_tokens
            .insert(record.token.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn lookup_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        Ok(self.tables.lock().await.refresh_tokens.get(token).cloned())
    }

    async fn revoke_refresh_token(&self, token: &str, at: DateTime<Utc>) -> Result<RevokeOutcome> {
        let mut tables = self.tables.lock().await;
        let Some(record) = tables.refresh_tokens.get_mut(token) else {
            return Ok(RevokeOutcome::NotFound);
        };
        if record.revoked_at.is_some() {
            return Ok(RevokeOutcome::AlreadyRevoked);
        }
        record.revoked_at = Some(at);
        Ok(RevokeOutcome::Revoked)
    }

    async fn purge_all_refresh_tokens(&self) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let purged = tables.refresh_tokens.len() as u64;
        tables.refresh_tokens.clear();
        Ok(purged)
    }

    async fn purge_all_users(&self) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let purged = tables.users.len() as u64;
        tables.users.clear();
        tables.refresh_tokens.clear();
        Ok(purged)
    }
}
