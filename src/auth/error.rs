//! Error taxonomy for the auth core.
//!
//! Every failure path inside the core resolves to one `AuthError` kind. The kinds
//! exist so callers can branch and audit logs can record what failed; at the HTTP
//! boundary they collapse into an [`Outcome`] that never reveals which check
//! rejected the request.

use thiserror::Error;

use super::jwt;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("malformed credential")]
    MalformedCredential,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("unexpected signing algorithm: {0}")]
    WrongAlgorithm(String),
    #[error("token subject is not an identity")]
    MalformedSubject,
    #[error("token expired")]
    Expired,
    #[error("refresh token revoked")]
    Revoked,
    #[error("refresh token not found")]
    NotFound,
    #[error("credentials do not match")]
    Mismatch,
    #[error("principal does not own the resource")]
    Forbidden,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

/// What the caller of the core is allowed to learn about a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Unauthorized,
    Forbidden,
    Conflict,
    BadRequest,
    Internal,
}

impl AuthError {
    /// Collapse the internal kind into its public outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::MissingCredential
            | Self::MalformedCredential
            | Self::InvalidSignature
            | Self::WrongAlgorithm(_)
            | Self::MalformedSubject
            | Self::Expired
            | Self::Revoked
            | Self::NotFound
            | Self::Mismatch => Outcome::Unauthorized,
            Self::Forbidden => Outcome::Forbidden,
            Self::EmailTaken => Outcome::Conflict,
            Self::InvalidInput(_) => Outcome::BadRequest,
            Self::Internal(_) => Outcome::Internal,
        }
    }

    /// Short stable label for structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedCredential => "malformed_credential",
            Self::InvalidSignature => "invalid_signature",
            Self::WrongAlgorithm(_) => "wrong_algorithm",
            Self::MalformedSubject => "malformed_subject",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::NotFound => "not_found",
            Self::Mismatch => "mismatch",
            Self::Forbidden => "forbidden",
            Self::EmailTaken => "email_taken",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<jwt::Error> for AuthError {
    fn from(err: jwt::Error) -> Self {
        match err {
            jwt::Error::UnsupportedAlg(alg) => Self::WrongAlgorithm(alg),
            jwt::Error::InvalidSignature => Self::InvalidSignature,
            jwt::Error::Expired => Self::Expired,
            jwt::Error::MalformedSubject => Self::MalformedSubject,
            jwt::Error::TokenFormat
            | jwt::Error::Base64
            | jwt::Error::Json(_)
            | jwt::Error::InvalidIssuer => Self::MalformedCredential,
            err @ (jwt::Error::EmptyKey | jwt::Error::InvalidTtl) => Self::internal(err),
        }
    }
}
