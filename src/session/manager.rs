//! Session Manager - stateless encrypted local sessions
//!
//! The local session, the pending OAuth handshake and flashed messages all live
//! in AES-256-GCM encrypted cookies created by the [`CookieFactory`]. Nothing is
//! kept server side, so every method here is a pure function of the request
//! and the configured key.

use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{FlashMessage, LoginMethod, SessionUser};
use crate::oauth::PendingAuthorization;
use crate::session::cookie::{CookieFactory, FLASH_COOKIE, OAUTH_STATE_COOKIE};
use crate::settings::SessionSettings;
use crate::users::LocalUser;
use crate::utils::crypto::derive_encryption_key;

#[derive(Clone)]
pub struct SessionManager {
    cookie_factory: CookieFactory,
    lifetime: chrono::Duration,
}

// =============================================================================
// Construction
// =============================================================================

impl SessionManager {
    #[must_use]
    pub fn new(key: &[u8], cookie_secure: bool, cookie_name: &str, lifetime_minutes: u64) -> Self {
        let encryption_key = derive_encryption_key(key);

        Self {
            cookie_factory: CookieFactory::new(
                encryption_key,
                cookie_secure,
                cookie_name,
                lifetime_minutes,
            ),
            lifetime: chrono::Duration::minutes(i64::try_from(lifetime_minutes).unwrap_or(30)),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self::new(
            settings.secret.as_bytes(),
            settings.secure,
            &settings.cookie_name,
            settings.lifetime_minutes,
        )
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        self.cookie_factory.session_cookie_name()
    }
}

// =============================================================================
// Local session
// =============================================================================

impl SessionManager {
    /// Establish a local session for `user`
    ///
    /// # Errors
    ///
    /// Returns an error if the session cookie cannot be encrypted
    pub fn login_user(
        &self,
        user: &LocalUser,
        login_method: LoginMethod,
    ) -> Result<(SessionUser, Cookie<'static>)> {
        let now = Utc::now();
        let session = SessionUser {
            session_id: Uuid::new_v4(),
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            login_method,
            authenticated_at: now,
            expires_at: now + self.lifetime,
        };

        let cookie = self.cookie_factory.create_session_cookie(&session)?;
        Ok((session, cookie))
    }

    /// The session user of this request, if the local session cookie is valid and unexpired
    #[must_use]
    pub fn current_user(&self, req: &HttpRequest) -> Option<SessionUser> {
        let session: SessionUser = self.cookie_factory.read_cookie(req, self.cookie_name())?;

        if session.is_expired() {
            log::debug!(
                "Session {} expired at {}",
                session.session_id,
                session.expires_at
            );
            return None;
        }
        Some(session)
    }

    #[must_use]
    pub fn is_authenticated(&self, req: &HttpRequest) -> bool {
        self.current_user(req).is_some()
    }

    /// Re-issue the session cookie with a fresh expiry
    #[must_use]
    pub fn refreshed_cookie(&self, req: &HttpRequest) -> Option<Cookie<'static>> {
        let mut session = self.current_user(req)?;
        session.expires_at = Utc::now() + self.lifetime;

        match self.cookie_factory.create_session_cookie(&session) {
            Ok(cookie) => Some(cookie),
            Err(e) => {
                log::warn!("Failed to refresh session {}: {e}", session.session_id);
                None
            }
        }
    }

    #[must_use]
    pub fn clear_session_cookie(&self) -> Cookie<'static> {
        self.cookie_factory
            .create_expired_cookie(self.cookie_name(), SameSite::Strict)
    }
}

// =============================================================================
// Flash messages
// =============================================================================

impl SessionManager {
    /// # Errors
    ///
    /// Returns an error if the flash cookie cannot be encrypted
    pub fn flash(&self, message: FlashMessage) -> Result<Cookie<'static>> {
        self.cookie_factory.create_flash_cookie(&[message])
    }

    /// Messages flashed by the previous response
    #[must_use]
    pub fn take_flash(&self, req: &HttpRequest) -> Vec<FlashMessage> {
        self.cookie_factory
            .read_cookie(req, FLASH_COOKIE)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn clear_flash_cookie(&self) -> Cookie<'static> {
        self.cookie_factory
            .create_expired_cookie(FLASH_COOKIE, SameSite::Lax)
    }
}

// =============================================================================
// OAuth handshake state
// =============================================================================

impl SessionManager {
    /// # Errors
    ///
    /// Returns an error if the state cookie cannot be encrypted
    pub fn store_oauth_state(&self, pending: &PendingAuthorization) -> Result<Cookie<'static>> {
        self.cookie_factory.create_state_cookie(pending)
    }

    #[must_use]
    pub fn take_oauth_state(&self, req: &HttpRequest) -> Option<PendingAuthorization> {
        self.cookie_factory.read_cookie(req, OAUTH_STATE_COOKIE)
    }

    #[must_use]
    pub fn clear_oauth_state_cookie(&self) -> Cookie<'static> {
        self.cookie_factory
            .create_expired_cookie(OAUTH_STATE_COOKIE, SameSite::Lax)
    }
}
