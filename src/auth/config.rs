//! Process-wide auth configuration, fixed at start.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::{AuthError, password::SecretHasher};

const DEFAULT_IDENTITY_TOKEN_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: u64 = 60 * 24 * 60 * 60;

/// Deployment tier. Anything that is not explicitly `dev` is treated as production.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Platform {
    Dev,
    #[default]
    Production,
}

impl Platform {
    #[must_use]
    pub fn allows_destructive_operations(self) -> bool {
        matches!(self, Self::Dev)
    }
}

impl FromStr for Platform {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim() == "dev" {
            Self::Dev
        } else {
            Self::Production
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    signing_secret: SecretString,
    api_key: SecretString,
    platform: Platform,
    hasher: SecretHasher,
    identity_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl AuthConfig {
    /// # Errors
    ///
    /// Returns `InvalidInput` if the signing secret or API key is empty.
    pub fn new(
        signing_secret: SecretString,
        api_key: SecretString,
        platform: Platform,
    ) -> Result<Self, AuthError> {
        if signing_secret.expose_secret().is_empty() {
            return Err(AuthError::InvalidInput("signing secret must not be empty"));
        }
        if api_key.expose_secret().trim().is_empty() {
            return Err(AuthError::InvalidInput("api key must not be empty"));
        }
        Ok(Self {
            signing_secret,
            api_key,
            platform,
            hasher: SecretHasher::default(),
            identity_token_ttl: Duration::from_secs(DEFAULT_IDENTITY_TOKEN_TTL_SECONDS),
            refresh_token_ttl: Duration::from_secs(DEFAULT_REFRESH_TOKEN_TTL_SECONDS),
        })
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` if `cost` is not a usable bcrypt cost.
    pub fn with_hash_cost(mut self, cost: u32) -> Result<Self, AuthError> {
        self.hasher = SecretHasher::new(cost)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_identity_token_ttl(mut self, ttl: Duration) -> Self {
        self.identity_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    pub(crate) fn signing_secret(&self) -> &[u8] {
        self.signing_secret.expose_secret().as_bytes()
    }

    pub(crate) fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn hasher(&self) -> SecretHasher {
        self.hasher
    }

    #[must_use]
    pub fn identity_token_ttl(&self) -> Duration {
        self.identity_token_ttl
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_secret", &"***")
            .field("api_key", &"***")
            .field("platform", &self.platform)
            .field("hash_cost", &self.hasher.cost())
            .field("identity_token_ttl", &self.identity_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::DEFAULT_HASH_COST;

    fn config() -> Result<AuthConfig, AuthError> {
        AuthConfig::new(
            SecretString::from("jwt-secret"),
            SecretString::from("polka-key"),
            Platform::Dev,
        )
    }

    #[test]
    fn defaults_follow_reference_policy() -> Result<(), AuthError> {
        let config = config()?;
        assert_eq!(config.identity_token_ttl(), Duration::from_secs(3600));
        assert_eq!(
            config.refresh_token_ttl(),
            Duration::from_secs(60 * 24 * 3600)
        );
        assert_eq!(config.hasher().cost(), DEFAULT_HASH_COST);
        Ok(())
    }

    #[test]
    fn empty_secrets_are_rejected() {
        assert!(AuthConfig::new(
            SecretString::from(""),
            SecretString::from("key"),
            Platform::Dev
        )
        .is_err());
        assert!(AuthConfig::new(
            SecretString::from("secret"),
            SecretString::from("  "),
            Platform::Dev
        )
        .is_err());
    }

    #[test]
    fn hash_cost_is_validated() -> Result<(), AuthError> {
        assert!(config()?.with_hash_cost(0).is_err());
        assert_eq!(config()?.with_hash_cost(4)?.hasher().cost(), 4);
        Ok(())
    }

    #[test]
    fn only_dev_platform_allows_destructive_operations() {
        assert_eq!("dev".parse::<Platform>(), Ok(Platform::Dev));
        assert_eq!("production".parse::<Platform>(), Ok(Platform::Production));
        assert_eq!("DEV".parse::<Platform>(), Ok(Platform::Production));
        assert_eq!("".parse::<Platform>(), Ok(Platform::Production));
        assert!(Platform::Dev.allows_destructive_operations());
        assert!(!Platform::Production.allows_destructive_operations());
    }

    #[test]
    fn debug_redacts_secrets() -> Result<(), AuthError> {
        let rendered = format!("{:?}", config()?);
        assert!(!rendered.contains("jwt-secret"));
        assert!(!rendered.contains("polka-key"));
        assert!(rendered.contains("***"));
        Ok(())
    }
}
