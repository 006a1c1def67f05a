//! Login capability
//!
//! Login surfaces are composed rather than extended: the database and OAuth
//! views implement [`LoginView`], and the bridged view wraps either one,
//! delegating to it whenever the external session does not apply.

use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use serde::Deserialize;

/// Credentials posted by the login form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Post-login target carried through the form
    pub redirect: Option<String>,
}

/// What the route extracted for a login call
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    /// Provider segment of `/login/{provider}`
    pub provider: Option<String>,
    /// Present for form submissions
    pub form: Option<LoginForm>,
}

impl LoginRequest {
    #[must_use]
    pub fn page() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(provider: &str) -> Self {
        Self {
            provider: Some(provider.to_string()),
            form: None,
        }
    }

    #[must_use]
    pub fn submit(form: LoginForm) -> Self {
        Self {
            provider: None,
            form: Some(form),
        }
    }
}

/// A base view's own logout teardown failed
#[derive(Debug, thiserror::Error)]
pub enum LogoutError {
    #[error("logout failed: {0}")]
    Failed(String),
}

/// Login and logout as a pluggable capability
#[async_trait(?Send)]
pub trait LoginView: Send + Sync {
    /// Always resolves to a response: a redirect or a rendered page
    async fn login(&self, req: &HttpRequest, login: LoginRequest) -> HttpResponse;

    /// # Errors
    ///
    /// Returns an error if the view's own session teardown fails
    async fn logout(&self, req: &HttpRequest) -> Result<HttpResponse, LogoutError>;
}

#[async_trait(?Send)]
impl<T: LoginView + ?Sized> LoginView for std::sync::Arc<T> {
    async fn login(&self, req: &HttpRequest, login: LoginRequest) -> HttpResponse {
        (**self).login(req, login).await
    }

    async fn logout(&self, req: &HttpRequest) -> Result<HttpResponse, LogoutError> {
        (**self).logout(req).await
    }
}
