//! # Chirpy auth
//!
//! Authentication and session management for the Chirpy API.
//!
//! ## Tokens
//!
//! Two kinds of credential leave this crate:
//!
//! 1. **Identity tokens:** HS256-signed JWTs with a one-hour lifetime. They are
//!    validated offline on every protected request; nothing is stored.
//! 2. **Refresh tokens:** 256-bit random values, hex encoded, persisted with a
//!    60-day expiry. They only mint new identity tokens and can be revoked.
//!
//! Passwords are stored as bcrypt hashes. Credentials arrive in the
//! `Authorization` header as `Bearer <token>` or, for the payment webhook,
//! `ApiKey <key>`.
//!
//! ## Storage
//!
//! [`store::AuthStore`] is the only way the core reaches durable state. The
//! `PostgreSQL` adapter is used when a DSN is configured; otherwise an in-memory
//! store backs the process. See `sql/schema.sql` for the tables.

pub mod auth;
pub mod chirpy;
pub mod cli;
pub mod store;
