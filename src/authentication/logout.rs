// Logout hook: the external session cookie is deleted on every logout,
// whatever the wrapped view's own teardown did

use actix_web::HttpResponse;

use super::traits::LogoutError;
use crate::session::{external_cookie_removal, SessionManager};
use crate::settings::{ExternalCookieSettings, ReportgateSettings};
use crate::utils::ResponseBuilder;

#[derive(Clone)]
pub struct LogoutHook {
    external_cookie: ExternalCookieSettings,
    sessions: SessionManager,
    login_url: String,
}

impl LogoutHook {
    #[must_use]
    pub fn new(settings: &ReportgateSettings, sessions: SessionManager) -> Self {
        Self {
            external_cookie: settings.external_cookie.clone(),
            sessions,
            login_url: settings.application.login_url.clone(),
        }
    }

    /// Complete a logout given the base view's outcome
    ///
    /// A failed base logout still ends the local session and lands on the login page.
    #[must_use]
    pub fn finish(&self, base: Result<HttpResponse, LogoutError>) -> HttpResponse {
        let mut response = match base {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Base logout failed, clearing the local session directly: {e}");
                ResponseBuilder::redirect(&self.login_url)
                    .with_cookie(self.sessions.clear_session_cookie())
                    .build()
            }
        };

        if let Err(e) = response.add_cookie(&external_cookie_removal(&self.external_cookie)) {
            log::error!("Failed to attach external session cookie deletion: {e}");
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::TestFixtures;
    use actix_web::cookie::SameSite;
    use actix_web::http::{header, StatusCode};

    fn hook() -> LogoutHook {
        LogoutHook::new(&TestFixtures::settings(), TestFixtures::session_manager())
    }

    fn external_removal(response: &HttpResponse) -> Option<actix_web::cookie::Cookie<'_>> {
        response.cookies().find(|c| c.name() == "session")
    }

    #[test]
    fn test_successful_base_logout_gets_external_removal() {
        let base = ResponseBuilder::redirect("/login/").build();
        let response = hook().finish(Ok(base));

        assert_eq!(response.status(), StatusCode::FOUND);
        let removal = external_removal(&response).unwrap();
        assert_eq!(removal.value(), "");
        assert_eq!(removal.path(), Some("/"));
        assert_eq!(removal.domain(), Some("insentric.net"));
        assert_eq!(removal.secure(), Some(true));
        assert_eq!(removal.http_only(), Some(true));
        assert_eq!(removal.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn test_failed_base_logout_still_clears_everything() {
        let response = hook().finish(Err(LogoutError::Failed("store unavailable".to_string())));

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login/");
        assert!(external_removal(&response).is_some());
        assert!(response
            .cookies()
            .any(|c| c.name() == "reportsession" && c.value().is_empty()));
    }

    #[test]
    fn test_base_response_is_kept() {
        let base = HttpResponse::Ok().body("bye");
        let response = hook().finish(Ok(base));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(external_removal(&response).is_some());
    }
}
