//! Verification of the identity platform's signed session cookie
//!
//! The verifier is constructed once at startup and injected wherever a
//! session cookie has to be checked. Every outcome is a [`VerifyResult`];
//! nothing on this path returns an error to the caller.

pub mod jwks;
pub mod revocation;
pub mod verifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use jwks::{JsonWebKey, JsonWebKeySet, JwksCache};
pub use revocation::{AccountLookupRevocationChecker, RevocationChecker};
pub use verifier::IdentityPlatformVerifier;

/// Claims carried by a verified session cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub aud: String,
    /// Identity platform user id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    /// Remaining provider-asserted claims
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Why a session cookie was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyFailure {
    #[error("malformed session cookie: {0}")]
    Malformed(String),
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("session cookie has no key id")]
    MissingKeyId,
    #[error("signing key not found: {0}")]
    KeyNotFound(String),
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),
    #[error("failed to decode signing key: {0}")]
    KeyDecoding(String),
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("session cookie has expired")]
    Expired,
    #[error("session cookie '{0}' lies in the future")]
    NotYetValid(&'static str),
    #[error("missing claim: {0}")]
    MissingClaim(&'static str),
    #[error("claim '{claim}' mismatch: expected '{expected}', got '{actual}'")]
    InvalidClaim {
        claim: &'static str,
        expected: String,
        actual: String,
    },
    #[error("session cookie has been revoked")]
    Revoked,
    #[error("user account is disabled")]
    AccountDisabled,
    #[error("user account no longer exists")]
    AccountNotFound,
    #[error("revocation check failed: {0}")]
    RevocationCheck(String),
    #[error("verification timed out")]
    Timeout,
}

/// Outcome of verifying a session cookie
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyResult {
    Verified(SessionClaims),
    Failed(VerifyFailure),
}

impl From<Result<SessionClaims, VerifyFailure>> for VerifyResult {
    fn from(result: Result<SessionClaims, VerifyFailure>) -> Self {
        match result {
            Ok(claims) => Self::Verified(claims),
            Err(failure) => Self::Failed(failure),
        }
    }
}

/// Injectable session cookie verification capability
#[async_trait]
pub trait SessionCookieVerifier: Send + Sync {
    async fn verify(&self, session_cookie: &str) -> VerifyResult;
}
