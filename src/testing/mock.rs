//! Mock objects and fake implementations for testing
//!
//! Every mock is `Clone` and shares its call counters between clones, so a
//! test can hand one copy to the code under test and inspect the other.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use chrono::Utc;

use super::constants::TEST_PROJECT_ID;
use crate::authentication::{LoginRequest, LoginView, LogoutError};
use crate::identity::{SessionClaims, SessionCookieVerifier, VerifyFailure, VerifyResult};
use crate::models::OAuthUserInfo;
use crate::oauth::{OAuthError, OAuthProviderClient, ProviderLink};

/// Body the mock login view answers with
pub const MOCK_LOGIN_BODY: &str = "fallback login view";

/// Authorization code the mock provider accepts
pub const MOCK_AUTHORIZATION_CODE: &str = "good-code";

#[derive(Clone)]
enum Verdict {
    Accept(Option<String>),
    Fail(VerifyFailure),
}

/// Verifier with a scripted outcome, whatever the cookie value
#[derive(Clone)]
pub struct MockVerifier {
    verdict: Verdict,
    calls: Arc<AtomicUsize>,
}

impl MockVerifier {
    fn with(verdict: Verdict) -> Self {
        Self {
            verdict,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Verifies every cookie as belonging to `email`
    #[must_use]
    pub fn accepting(email: &str) -> Self {
        Self::with(Verdict::Accept(Some(email.to_string())))
    }

    /// Verifies every cookie, but the claims carry no email
    #[must_use]
    pub fn without_email() -> Self {
        Self::with(Verdict::Accept(None))
    }

    #[must_use]
    pub fn failing(reason: VerifyFailure) -> Self {
        Self::with(Verdict::Fail(reason))
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn claims(email: Option<String>) -> SessionClaims {
        let now = Utc::now().timestamp();
        SessionClaims {
            iss: format!("https://session.firebase.google.com/{TEST_PROJECT_ID}"),
            aud: TEST_PROJECT_ID.to_string(),
            sub: "mock-uid".to_string(),
            iat: now,
            exp: now + 3600,
            auth_time: now,
            email,
            email_verified: Some(true),
            name: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[async_trait]
impl SessionCookieVerifier for MockVerifier {
    async fn verify(&self, _session_cookie: &str) -> VerifyResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.verdict {
            Verdict::Accept(email) => VerifyResult::Verified(Self::claims(email.clone())),
            Verdict::Fail(reason) => VerifyResult::Failed(reason.clone()),
        }
    }
}

/// Base login view that answers 200 and counts how often it ran
#[derive(Clone, Default)]
pub struct MockLoginView {
    login_calls: Arc<AtomicUsize>,
    logout_fails: bool,
}

impl MockLoginView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A view whose own logout always errors
    #[must_use]
    pub fn failing_logout() -> Self {
        Self {
            logout_fails: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl LoginView for MockLoginView {
    async fn login(&self, _req: &HttpRequest, _login: LoginRequest) -> HttpResponse {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        HttpResponse::Ok().body(MOCK_LOGIN_BODY)
    }

    async fn logout(&self, _req: &HttpRequest) -> Result<HttpResponse, LogoutError> {
        if self.logout_fails {
            return Err(LogoutError::Failed("mock logout failure".to_string()));
        }
        Ok(HttpResponse::Found()
            .insert_header((actix_web::http::header::LOCATION, "/login/"))
            .finish())
    }
}

/// Provider client offering `google` only and returning a fixed identity
#[derive(Clone)]
pub struct MockOAuthClient {
    user: OAuthUserInfo,
}

impl MockOAuthClient {
    #[must_use]
    pub fn new(user: OAuthUserInfo) -> Self {
        Self { user }
    }

    fn check_provider(provider: &str) -> Result<(), OAuthError> {
        if provider == "google" {
            Ok(())
        } else {
            Err(OAuthError::UnknownProvider(provider.to_string()))
        }
    }
}

#[async_trait]
impl OAuthProviderClient for MockOAuthClient {
    fn providers(&self) -> Vec<ProviderLink> {
        vec![ProviderLink {
            name: "google".to_string(),
            label: "Google".to_string(),
        }]
    }

    fn authorize_url(&self, provider: &str, state: &str) -> Result<String, OAuthError> {
        Self::check_provider(provider)?;
        let mut url = url::Url::parse("https://accounts.example/o/oauth2/auth")
            .map_err(|e| OAuthError::Configuration(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", "test-client")
            .append_pair("state", state);
        Ok(url.to_string())
    }

    async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
        _state: &str,
    ) -> Result<String, OAuthError> {
        Self::check_provider(provider)?;
        if code == MOCK_AUTHORIZATION_CODE {
            Ok("mock-access-token".to_string())
        } else {
            Err(OAuthError::TokenExchange("invalid_grant".to_string()))
        }
    }

    async fn user_info(
        &self,
        provider: &str,
        _access_token: &str,
    ) -> Result<OAuthUserInfo, OAuthError> {
        Self::check_provider(provider)?;
        Ok(self.user.clone())
    }
}
