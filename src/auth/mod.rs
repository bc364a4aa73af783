//! Authentication and session core.
//!
//! - `password`: bcrypt secret hashing.
//! - `jwt`: HS256 identity tokens.
//! - `refresh`: opaque, persisted refresh tokens.
//! - `credentials`: `Authorization` header parsing.
//! - `session`: the operations request handlers call.

mod config;
pub mod credentials;
mod error;
pub mod jwt;
pub mod password;
pub mod refresh;
mod session;

pub use config::{AuthConfig, Platform};
pub use error::{AuthError, Outcome};
pub use password::SecretHasher;
pub use refresh::{RefreshTokenState, RefreshTokens};
pub use session::{Profile, Session, SessionManager, authenticate_privileged, authorize_owner};
