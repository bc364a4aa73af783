//! Repository interface between the auth core and durable storage.
//!
//! Each method is one independently atomic call. The core never holds a lock
//! across calls; concurrency control belongs to the implementation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A user row, including the hashed secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_chirpy_red: bool,
}

/// A persisted refresh token. `revoked_at` is set once and never cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(UserRecord),
    Conflict,
}

#[derive(Debug)]
pub enum UpdateUserOutcome {
    Updated(UserRecord),
    Conflict,
    NotFound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevokeOutcome {
    Revoked,
    AlreadyRevoked,
    NotFound,
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn secret_record_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn create_secret_record(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> Result<CreateUserOutcome>;

    async fn update_secret_record(
        &self,
        user_id: Uuid,
        email: &str,
        hashed_password: &str,
    ) -> Result<UpdateUserOutcome>;

    /// Mark a user as premium. Returns `false` when the user does not exist.
    async fn upgrade_user(&self, user_id: Uuid) -> Result<bool>;

    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<InsertOutcome>;

    async fn lookup_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>>;

    async fn revoke_refresh_token(&self, token: &str, at: DateTime<Utc>) -> Result<RevokeOutcome>;

    async fn purge_all_refresh_tokens(&self) -> Result<u64>;

    /// Delete every user. Refresh tokens owned by them go too.
    async fn purge_all_users(&self) -> Result<u64>;
}
