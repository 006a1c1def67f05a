use actix_web::cookie::{
    time::{Duration, OffsetDateTime},
    Cookie, SameSite,
};
use actix_web::HttpRequest;
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

use crate::models::{FlashMessage, SessionUser};
use crate::oauth::PendingAuthorization;
use crate::settings::ExternalCookieSettings;
use crate::utils::crypto::{decrypt_data, encrypt_data};

pub const OAUTH_STATE_COOKIE: &str = "reportgate_oauth_state";
pub const FLASH_COOKIE: &str = "reportgate_flash";

/// Options for cookie creation
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Duration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            same_site: SameSite::Strict,
            path: "/".to_string(),
            max_age: Duration::minutes(30),
        }
    }
}

/// Creates the gateway's own encrypted cookies
#[derive(Clone)]
pub struct CookieFactory {
    encryption_key: [u8; 32],
    cookie_secure: bool,
    session_cookie_name: String,
    session_lifetime_minutes: u64,
}

impl CookieFactory {
    #[must_use]
    pub fn new(
        encryption_key: [u8; 32],
        cookie_secure: bool,
        session_cookie_name: &str,
        session_lifetime_minutes: u64,
    ) -> Self {
        Self {
            encryption_key,
            cookie_secure,
            session_cookie_name: session_cookie_name.to_string(),
            session_lifetime_minutes,
        }
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    /// Generic method to create a cookie with encrypted data
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_cookie<T: Serialize>(
        &self,
        name: &str,
        data: &T,
        options: CookieOptions,
    ) -> Result<Cookie<'static>> {
        let value = encrypt_data(data, &self.encryption_key)?;

        Ok(Cookie::build(name.to_owned(), value)
            .http_only(options.http_only)
            .secure(self.cookie_secure && options.secure)
            .same_site(options.same_site)
            .path(options.path)
            .max_age(options.max_age)
            .finish())
    }

    /// Create the encrypted local session cookie
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_session_cookie(&self, session: &SessionUser) -> Result<Cookie<'static>> {
        self.create_cookie(
            &self.session_cookie_name,
            session,
            CookieOptions {
                max_age: Duration::minutes(
                    i64::try_from(self.session_lifetime_minutes).unwrap_or(30),
                ),
                ..Default::default()
            },
        )
    }

    /// Short-lived cookie holding the pending OAuth handshake.
    /// `Lax` so it survives the provider's cross-site redirect back.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_state_cookie(&self, pending: &PendingAuthorization) -> Result<Cookie<'static>> {
        self.create_cookie(
            OAUTH_STATE_COOKIE,
            pending,
            CookieOptions {
                same_site: SameSite::Lax,
                max_age: Duration::minutes(10),
                ..Default::default()
            },
        )
    }

    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_flash_cookie(&self, messages: &[FlashMessage]) -> Result<Cookie<'static>> {
        self.create_cookie(
            FLASH_COOKIE,
            &messages,
            CookieOptions {
                same_site: SameSite::Lax,
                max_age: Duration::seconds(60),
                ..Default::default()
            },
        )
    }

    /// Decrypt a cookie of ours; tampered, stale-key or foreign values read as absent
    #[must_use]
    pub fn read_cookie<T: DeserializeOwned>(&self, req: &HttpRequest, name: &str) -> Option<T> {
        let cookie = req.cookie(name)?;
        match decrypt_data::<T>(cookie.value(), &self.encryption_key) {
            Ok(data) => Some(data),
            Err(e) => {
                log::debug!("Ignoring undecryptable cookie '{name}': {e}");
                None
            }
        }
    }

    /// Create an expired cookie to clear one of ours
    #[must_use]
    pub fn create_expired_cookie(&self, name: &str, same_site: SameSite) -> Cookie<'static> {
        create_expired_cookie(name, "/", None, self.cookie_secure, same_site)
    }
}

/// Create a cookie-deletion instruction matching the attributes the cookie was set with
#[must_use]
pub fn create_expired_cookie(
    name: &str,
    path: &str,
    domain: Option<&str>,
    secure: bool,
    same_site: SameSite,
) -> Cookie<'static> {
    let mut builder = Cookie::build(name.to_owned(), "")
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .path(path.to_owned())
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH);
    if let Some(domain) = domain {
        builder = builder.domain(domain.to_owned());
    }
    builder.finish()
}

/// Deletion of the identity platform's session cookie.
/// Always `Secure`, `HttpOnly` and `SameSite=Strict` on the configured path and parent domain.
#[must_use]
pub fn external_cookie_removal(settings: &ExternalCookieSettings) -> Cookie<'static> {
    create_expired_cookie(
        &settings.name,
        &settings.path,
        Some(&settings.domain),
        true,
        SameSite::Strict,
    )
}
