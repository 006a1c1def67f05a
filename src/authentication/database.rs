//! Username/password login against the local user directory

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;

use super::bridge::REDIRECT_PARAM;
use super::pages;
use super::traits::{LoginForm, LoginRequest, LoginView, LogoutError};
use crate::models::{FlashMessage, LoginMethod};
use crate::session::SessionManager;
use crate::settings::ReportgateSettings;
use crate::users::{verify_password, LocalUser, UserDirectory};
use crate::utils::redirect_validator::{request_host_url, resolve_post_login_redirect};
use crate::utils::{LoggingHelper, RedirectPolicy, ResponseBuilder};

pub struct DatabaseLoginView {
    directory: Arc<dyn UserDirectory>,
    sessions: SessionManager,
    index_url: String,
    login_url: String,
    redirect_policy: RedirectPolicy,
    invalid_login_message: String,
}

impl DatabaseLoginView {
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        sessions: SessionManager,
        settings: &ReportgateSettings,
    ) -> Self {
        Self {
            directory,
            sessions,
            index_url: settings.application.index_url.clone(),
            login_url: settings.application.login_url.clone(),
            redirect_policy: settings.auth.redirect_policy,
            invalid_login_message: settings.auth.invalid_login_message.clone(),
        }
    }

    /// Username first, then email, the way the login form accepts either
    async fn authenticate(&self, form: &LoginForm) -> Option<LocalUser> {
        let username = form.username.trim();
        if username.is_empty() || form.password.is_empty() {
            return None;
        }

        let by_username = match self.directory.find_user_by_username(username).await {
            Ok(found) => found,
            Err(e) => {
                log::warn!("Username lookup failed for {username}, trying email: {e}");
                None
            }
        };
        let found = match by_username {
            Some(user) => Some(user),
            None => match self.directory.find_user(username).await {
                Ok(found) => found,
                Err(e) => {
                    log::error!("User directory lookup failed for {username}: {e}");
                    None
                }
            },
        };

        found.filter(|user| {
            user.password_hash
                .as_deref()
                .is_some_and(|hash| verify_password(hash, &form.password))
        })
    }

    fn render_form(&self, req: &HttpRequest) -> HttpResponse {
        let flashes = self.sessions.take_flash(req);
        let redirect = url::form_urlencoded::parse(req.query_string().as_bytes())
            .find(|(key, _)| key == REDIRECT_PARAM)
            .map(|(_, value)| value.into_owned());

        let mut response =
            ResponseBuilder::html(pages::login_form(&self.login_url, &flashes, redirect.as_deref()));
        if !flashes.is_empty() {
            if let Err(e) = response.add_cookie(&self.sessions.clear_flash_cookie()) {
                log::warn!("Failed to clear flash cookie: {e}");
            }
        }
        response
    }

    fn reject(&self, form: &LoginForm) -> HttpResponse {
        log::info!("Invalid login attempt for {}", form.username.trim());

        let location = match form.redirect.as_deref().filter(|r| !r.is_empty()) {
            Some(target) => format!(
                "{}?{REDIRECT_PARAM}={}",
                self.login_url,
                urlencoding::encode(target)
            ),
            None => self.login_url.clone(),
        };

        let mut builder = ResponseBuilder::redirect(&location);
        match self
            .sessions
            .flash(FlashMessage::warning(&self.invalid_login_message))
        {
            Ok(cookie) => builder = builder.with_cookie(cookie),
            Err(e) => log::warn!("Failed to flash login error: {e}"),
        }
        builder.build()
    }
}

#[async_trait(?Send)]
impl LoginView for DatabaseLoginView {
    async fn login(&self, req: &HttpRequest, login: LoginRequest) -> HttpResponse {
        if self.sessions.is_authenticated(req) {
            return ResponseBuilder::redirect(&self.index_url).build();
        }

        let Some(form) = login.form else {
            return self.render_form(req);
        };

        let Some(user) = self.authenticate(&form).await else {
            return self.reject(&form);
        };

        let cookie = match self.sessions.login_user(&user, LoginMethod::Database) {
            Ok((_, cookie)) => cookie,
            Err(e) => {
                log::error!("Failed to create local session for {}: {e}", user.email);
                return self.reject(&form);
            }
        };
        LoggingHelper::log_session_created(&user.email, "db");

        let requested = form.redirect.clone().or_else(|| {
            url::form_urlencoded::parse(req.query_string().as_bytes())
                .find(|(key, _)| key == REDIRECT_PARAM)
                .map(|(_, value)| value.into_owned())
        });
        let location = request_host_url(req).map_or_else(
            || self.index_url.clone(),
            |host_url| {
                resolve_post_login_redirect(
                    requested.as_deref(),
                    &host_url,
                    self.redirect_policy,
                    &self.index_url,
                )
            },
        );

        ResponseBuilder::redirect(&location).with_cookie(cookie).build()
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
