//! Provider login
//!
//! `/login/{provider}` starts the authorization-code handshake and
//! `/oauth-authorized/{provider}` completes it. Accounts are never created
//! here: the provider's email must already belong to a local user.

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;

use super::pages;
use super::traits::{LoginRequest, LoginView, LogoutError};
use crate::models::{FlashMessage, LoginMethod};
use crate::oauth::{
    decode_state, encode_state, query_args, redirect_from_state, OAuthCallback, OAuthError,
    OAuthProviderClient, PendingAuthorization,
};
use crate::session::SessionManager;
use crate::settings::ReportgateSettings;
use crate::users::{DirectoryError, UserDirectory};
use crate::utils::crypto::generate_csrf_token;
use crate::utils::redirect_validator::{request_host_url, resolve_post_login_redirect};
use crate::utils::{LoggingHelper, RedirectPolicy, ResponseBuilder};

/// Why a provider callback did not produce a session
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error("provider returned no email")]
    MissingEmail,
    #[error("no local user for {0}")]
    UnknownUser(String),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("failed to create session: {0}")]
    Session(anyhow::Error),
}

pub struct OAuthLoginView {
    client: Arc<dyn OAuthProviderClient>,
    directory: Arc<dyn UserDirectory>,
    sessions: SessionManager,
    index_url: String,
    login_url: String,
    redirect_policy: RedirectPolicy,
    invalid_login_message: String,
}

impl OAuthLoginView {
    #[must_use]
    pub fn new(
        client: Arc<dyn OAuthProviderClient>,
        directory: Arc<dyn UserDirectory>,
        sessions: SessionManager,
        settings: &ReportgateSettings,
    ) -> Self {
        Self {
            client,
            directory,
            sessions,
            index_url: settings.application.index_url.clone(),
            login_url: settings.application.login_url.clone(),
            redirect_policy: settings.auth.redirect_policy,
            invalid_login_message: settings.auth.invalid_login_message.clone(),
        }
    }

    fn flash_cookie(&self) -> Option<Cookie<'static>> {
        match self
            .sessions
            .flash(FlashMessage::warning(&self.invalid_login_message))
        {
            Ok(cookie) => Some(cookie),
            Err(e) => {
                log::warn!("Failed to flash login error: {e}");
                None
            }
        }
    }

    fn render_picker(&self, req: &HttpRequest) -> HttpResponse {
        let flashes = self.sessions.take_flash(req);
        let mut response = ResponseBuilder::html(pages::provider_picker(
            &self.login_url,
            &self.client.providers(),
            &flashes,
            req.query_string(),
        ));
        if !flashes.is_empty() {
            if let Err(e) = response.add_cookie(&self.sessions.clear_flash_cookie()) {
                log::warn!("Failed to clear flash cookie: {e}");
            }
        }
        response
    }

    /// Redirect to the provider with signed state
    fn authorize(&self, req: &HttpRequest, provider: &str) -> Result<HttpResponse, OAuthError> {
        let secret = generate_csrf_token();
        let state = encode_state(&query_args(req.query_string()), &secret)?;
        let authorization_url = self.client.authorize_url(provider, &state)?;

        let state_cookie = self
            .sessions
            .store_oauth_state(&PendingAuthorization {
                provider: provider.to_string(),
                secret,
            })
            .map_err(|e| OAuthError::InvalidState(e.to_string()))?;

        Ok(ResponseBuilder::redirect(&authorization_url)
            .with_cookie(state_cookie)
            .build())
    }

    /// Handle the provider's redirect back
    pub async fn authorized(
        &self,
        req: &HttpRequest,
        provider: &str,
        callback: &OAuthCallback,
    ) -> HttpResponse {
        let clear_state = self.sessions.clear_oauth_state_cookie();

        match self.complete(req, provider, callback).await {
            Ok((cookie, location)) => ResponseBuilder::redirect(&location)
                .with_cookie(cookie)
                .with_cookie(clear_state)
                .build(),
            Err(e) => {
                LoggingHelper::log_callback_failure(provider, &e);
                ResponseBuilder::redirect(&self.login_url)
                    .with_cookies(self.flash_cookie())
                    .with_cookie(clear_state)
                    .build()
            }
        }
    }

    async fn complete(
        &self,
        req: &HttpRequest,
        provider: &str,
        callback: &OAuthCallback,
    ) -> Result<(Cookie<'static>, String), CallbackError> {
        if let Some(error) = &callback.error {
            let description = callback.error_description.as_deref().unwrap_or_default();
            return Err(OAuthError::Denied(format!("{error} {description}").trim().to_string()).into());
        }

        let pending = self
            .sessions
            .take_oauth_state(req)
            .ok_or_else(|| OAuthError::InvalidState("no authorization in progress".to_string()))?;
        if pending.provider != provider {
            return Err(OAuthError::InvalidState(format!(
                "authorization was started for {}",
                pending.provider
            ))
            .into());
        }

        let state = callback
            .state
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidState("missing state parameter".to_string()))?;
        let args = decode_state(state, &pending.secret)?;

        let code = callback
            .code
            .as_deref()
            .ok_or_else(|| OAuthError::Denied("no authorization code".to_string()))?;

        let access_token = self.client.exchange_code(provider, code, state).await?;
        let user_info = self.client.user_info(provider, &access_token).await?;
        if user_info.email.trim().is_empty() {
            return Err(CallbackError::MissingEmail);
        }

        let user = self
            .directory
            .find_user(&user_info.email)
            .await?
            .ok_or_else(|| CallbackError::UnknownUser(user_info.email.clone()))?;

        let (_, cookie) = self
            .sessions
            .login_user(&user, LoginMethod::OAuth(provider.to_string()))
            .map_err(CallbackError::Session)?;
        LoggingHelper::log_session_created(&user.email, &format!("oauth:{provider}"));

        let location = request_host_url(req).map_or_else(
            || self.index_url.clone(),
            |host_url| {
                resolve_post_login_redirect(
                    redirect_from_state(&args),
                    &host_url,
                    self.redirect_policy,
                    &self.index_url,
                )
            },
        );
        Ok((cookie, location))
    }
}

#[async_trait(?Send)]
impl LoginView for OAuthLoginView {
    async fn login(&self, req: &HttpRequest, login: LoginRequest) -> HttpResponse {
        if let Some(session) = self.sessions.current_user(req) {
            log::debug!("Already authenticated {}", session.email);
            return ResponseBuilder::redirect(&self.index_url).build();
        }

        let Some(provider) = login.provider else {
            return self.render_picker(req);
        };

        log::debug!("Going to call authorize for: {provider}");
        match self.authorize(req, &provider) {
            Ok(response) => response,
            Err(e) => {
                LoggingHelper::log_authorize_failure(&provider, &e);
                ResponseBuilder::redirect(&self.index_url)
                    .with_cookies(self.flash_cookie())
                    .build()
            }
        }
    }

    async fn logout(&self, req: &HttpRequest) -> Result<HttpResponse, LogoutError> {
        if let Some(session) = self.sessions.current_user(req) {
            log::info!("Logging out {}", session.email);
        }
        Ok(ResponseBuilder::redirect(&self.login_url)
            .with_cookie(self.sessions.clear_session_cookie())
            .build())
    }
}
