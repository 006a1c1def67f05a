//! Third-party provider login
//!
//! The provider handshake itself is an external collaborator behind
//! [`OAuthProviderClient`]; this module only builds the authorization request,
//! protects it with signed state, and turns the callback into an identity.

pub mod client;
pub mod state;

pub use client::{HttpOAuthClient, OAuthProviderClient, ProviderLink, RuntimeProvider};
pub use state::{decode_state, encode_state, query_args, redirect_from_state, StateArgs};

use serde::{Deserialize, Serialize};

/// Handshake in flight, kept in the encrypted state cookie until the callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub provider: String,
    /// Random secret the `state` parameter was signed with
    pub secret: String,
}

/// Query parameters of the provider's redirect back to us
#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("unknown OAuth provider: {0}")]
    UnknownProvider(String),
    #[error("OAuth configuration error: {0}")]
    Configuration(String),
    #[error("invalid OAuth state: {0}")]
    InvalidState(String),
    #[error("authorization denied by provider: {0}")]
    Denied(String),
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("failed to fetch user info: {0}")]
    UserInfo(String),
}
