//! Password hashing with bcrypt.
//!
//! Hashes are self-describing (`$2b$<cost>$<salt><digest>`), so verification needs
//! nothing but the stored string.

use anyhow::anyhow;

use super::AuthError;

pub const DEFAULT_HASH_COST: u32 = 11;
pub const MIN_HASH_COST: u32 = 4;
pub const MAX_HASH_COST: u32 = 31;

/// bcrypt only reads this many bytes of input; longer secrets are refused rather
/// than silently truncated.
pub const MAX_SECRET_BYTES: usize = 72;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecretHasher {
    cost: u32,
}

impl SecretHasher {
    /// Build a hasher with a fixed work factor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when `cost` is outside what bcrypt accepts.
    pub fn new(cost: u32) -> Result<Self, AuthError> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&cost) {
            return Err(AuthError::InvalidInput("hash cost out of range"));
        }
        Ok(Self { cost })
    }

    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a plaintext longer than [`MAX_SECRET_BYTES`],
    /// `Internal` if the hashing backend fails.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        if plaintext.len() > MAX_SECRET_BYTES {
            return Err(AuthError::InvalidInput("password longer than 72 bytes"));
        }
        bcrypt::hash(plaintext, self.cost)
            .map_err(|err| AuthError::internal(anyhow!("failed to hash password: {err}")))
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// # Errors
    ///
    /// Returns `Mismatch` for a wrong password and for a stored value that is not a
    /// parsable hash; callers cannot tell the two apart. A plaintext longer than
    /// [`MAX_SECRET_BYTES`] never matches.
    pub fn verify(&self, plaintext: &str, hashed: &str) -> Result<(), AuthError> {
        if plaintext.len() > MAX_SECRET_BYTES {
            return Err(AuthError::Mismatch);
        }
        match bcrypt::verify(plaintext, hashed) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(AuthError::Mismatch),
        }
    }
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self {
            cost: DEFAULT_HASH_COST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Result<SecretHasher, AuthError> {
        SecretHasher::new(MIN_HASH_COST)
    }

    #[test]
    fn default_cost_matches_policy() {
        assert_eq!(SecretHasher::default().cost(), 11);
    }

    #[test]
    fn rejects_zero_and_out_of_range_cost() {
        assert!(matches!(
            SecretHasher::new(0),
            Err(AuthError::InvalidInput(_))
        ));
        assert!(SecretHasher::new(3).is_err());
        assert!(SecretHasher::new(32).is_err());
        assert!(SecretHasher::new(4).is_ok());
    }

    #[test]
    fn verify_accepts_own_hash() -> Result<(), AuthError> {
        let hasher = fast()?;
        let hashed = hasher.hash("04234")?;
        assert_ne!(hashed, "04234");
        hasher.verify("04234", &hashed)
    }

    #[test]
    fn verify_rejects_other_password() -> Result<(), AuthError> {
        let hasher = fast()?;
        let hashed = hasher.hash("correct horse")?;
        assert!(matches!(
            hasher.verify("battery staple", &hashed),
            Err(AuthError::Mismatch)
        ));
        Ok(())
    }

    #[test]
    fn salts_differ_between_calls() -> Result<(), AuthError> {
        let hasher = fast()?;
        let first = hasher.hash("same")?;
        let second = hasher.hash("same")?;
        assert_ne!(first, second);
        hasher.verify("same", &first)?;
        hasher.verify("same", &second)
    }

    #[test]
    fn hash_embeds_cost() -> Result<(), AuthError> {
        let hasher = fast()?;
        let hashed = hasher.hash("pw")?;
        assert!(hashed.starts_with("$2b$04$"), "{hashed}");
        Ok(())
    }

    #[test]
    fn long_passwords_are_not_truncated() -> Result<(), AuthError> {
        let hasher = fast()?;
        let prefix = "a".repeat(MAX_SECRET_BYTES);

        assert!(matches!(
            hasher.hash(&format!("{prefix}correct")),
            Err(AuthError::InvalidInput(_))
        ));

        let hashed = hasher.hash(&prefix)?;
        hasher.verify(&prefix, &hashed)?;
        assert!(matches!(
            hasher.verify(&format!("{prefix}WRONG"), &hashed),
            Err(AuthError::Mismatch)
        ));
        Ok(())
    }

    #[test]
    fn corrupt_hash_looks_like_mismatch() -> Result<(), AuthError> {
        let hasher = fast()?;
        for stored in ["", "plaintext", "$2b$04$short"] {
            assert!(matches!(
                hasher.verify("pw", stored),
                Err(AuthError::Mismatch)
            ));
        }
        Ok(())
    }
}
