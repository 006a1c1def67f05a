//! Session bridge
//!
//! Turns the identity platform's session cookie into a local session. Any
//! outcome other than [`BridgeOutcome::Authenticated`] means "not
//! authenticated via the bridge" and the caller continues with its own login
//! view; no outcome is an error.

use std::future::Future;
use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::{HttpRequest, HttpResponse};

use crate::identity::{SessionCookieVerifier, VerifyFailure, VerifyResult};
use crate::models::{LoginMethod, SessionUser};
use crate::session::SessionManager;
use crate::settings::ReportgateSettings;
use crate::users::UserDirectory;
use crate::utils::redirect_validator::{request_host_url, resolve_post_login_redirect};
use crate::utils::{LoggingHelper, RedirectPolicy, ResponseBuilder};

/// Query parameter naming the post-login target
pub const REDIRECT_PARAM: &str = "redirect";

#[derive(Debug)]
pub enum BridgeOutcome {
    /// The request carries no external session cookie
    NoCredential,
    /// The cookie failed verification
    Rejected(VerifyFailure),
    /// Verified, but without an email to resolve
    NoEmailClaim,
    /// Verified, but no active local account has this email
    UnknownUser(String),
    /// The user directory could not be consulted
    DirectoryUnavailable(String),
    /// The local session cookie could not be created
    SessionFailure(String),
    Authenticated {
        session: SessionUser,
        cookie: Cookie<'static>,
        location: String,
    },
}

impl BridgeOutcome {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

pub struct SessionBridge {
    verifier: Arc<dyn SessionCookieVerifier>,
    directory: Arc<dyn UserDirectory>,
    sessions: SessionManager,
    external_cookie_name: String,
    index_url: String,
    redirect_policy: RedirectPolicy,
}

impl SessionBridge {
    #[must_use]
    pub fn new(
        verifier: Arc<dyn SessionCookieVerifier>,
        directory: Arc<dyn UserDirectory>,
        sessions: SessionManager,
        settings: &ReportgateSettings,
    ) -> Self {
        Self {
            verifier,
            directory,
            sessions,
            external_cookie_name: settings.external_cookie.name.clone(),
            index_url: settings.application.index_url.clone(),
            redirect_policy: settings.auth.redirect_policy,
        }
    }

    /// Whether the request already carries a valid local session
    #[must_use]
    pub fn has_local_session(&self, req: &HttpRequest) -> bool {
        self.sessions.is_authenticated(req)
    }

    /// Try to authenticate the request from its external session cookie
    pub async fn authenticate(&self, req: &HttpRequest) -> BridgeOutcome {
        let Some(cookie) = req.cookie(&self.external_cookie_name) else {
            return BridgeOutcome::NoCredential;
        };
        LoggingHelper::log_bridge_cookie_found(&self.external_cookie_name);

        let claims = match self.verifier.verify(cookie.value()).await {
            VerifyResult::Verified(claims) => claims,
            VerifyResult::Failed(reason) => {
                LoggingHelper::log_bridge_rejected(&reason);
                return BridgeOutcome::Rejected(reason);
            }
        };

        let Some(email) = claims
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
        else {
            LoggingHelper::log_bridge_missing_email(&claims.sub);
            return BridgeOutcome::NoEmailClaim;
        };

        let user = match self.directory.find_user(email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                LoggingHelper::log_bridge_unknown_user(email);
                return BridgeOutcome::UnknownUser(email.to_string());
            }
            Err(e) => {
                log::error!("User directory lookup failed for {email}: {e}");
                return BridgeOutcome::DirectoryUnavailable(e.to_string());
            }
        };

        let (session, cookie) = match self.sessions.login_user(&user, LoginMethod::SessionBridge) {
            Ok(login) => login,
            Err(e) => {
                log::error!("Failed to create local session for {email}: {e}");
                return BridgeOutcome::SessionFailure(e.to_string());
            }
        };

        let location = self.post_login_location(req);
        LoggingHelper::log_bridge_login(&user.email, &location);

        BridgeOutcome::Authenticated {
            session,
            cookie,
            location,
        }
    }

    /// Redirect into a bridged session, or hand the request to `fallback` untouched
    pub async fn login_or_else<F, Fut>(&self, req: &HttpRequest, fallback: F) -> HttpResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HttpResponse>,
    {
        match self.authenticate(req).await {
            BridgeOutcome::Authenticated {
                cookie, location, ..
            } => ResponseBuilder::redirect(&location).with_cookie(cookie).build(),
            _ => fallback().await,
        }
    }

    /// The requested `redirect` when it is safe, otherwise the index
    fn post_login_location(&self, req: &HttpRequest) -> String {
        let requested = url::form_urlencoded::parse(req.query_string().as_bytes())
            .find(|(key, _)| key == REDIRECT_PARAM)
            .map(|(_, value)| value.into_owned());

        match request_host_url(req) {
            Some(host_url) => resolve_post_login_redirect(
                requested.as_deref(),
                &host_url,
                self.redirect_policy,
                &self.index_url,
            ),
            None => self.index_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::TestFixtures;
    use crate::testing::mock::MockVerifier;
    use actix_web::cookie::Cookie;
    use actix_web::http::{header, StatusCode};
    use actix_web::test::TestRequest;

    fn make_bridge(verifier: MockVerifier) -> (SessionBridge, SessionManager) {
        let settings = TestFixtures::settings();
        let sessions = TestFixtures::session_manager();
        let bridge = SessionBridge::new(
            Arc::new(verifier),
            TestFixtures::directory(),
            sessions.clone(),
            &settings,
        );
        (bridge, sessions)
    }

    fn request(uri: &str, cookie: Option<&str>) -> HttpRequest {
        let mut req = TestRequest::get()
            .uri(uri)
            .insert_header((header::HOST, "app.example"));
        if let Some(value) = cookie {
            req = req.cookie(Cookie::new("session", value.to_string()));
        }
        req.to_http_request()
    }

    async fn fallback() -> HttpResponse {
        HttpResponse::Ok().body("fallback")
    }

    #[actix_web::test]
    async fn test_no_cookie_is_no_credential() {
        let (bridge, _) = make_bridge(MockVerifier::accepting("a@x.com"));
        let outcome = bridge.authenticate(&request("/login/", None)).await;
        assert!(matches!(outcome, BridgeOutcome::NoCredential));
    }

    #[actix_web::test]
    async fn test_known_user_is_authenticated() {
        let (bridge, sessions) = make_bridge(MockVerifier::accepting("a@x.com"));
        let outcome = bridge
            .authenticate(&request("/login/?redirect=/dashboard/5", Some("valid")))
            .await;

        let BridgeOutcome::Authenticated {
            session,
            cookie,
            location,
        } = outcome
        else {
            panic!("expected authentication, got {outcome:?}");
        };
        assert_eq!(session.email, "a@x.com");
        assert_eq!(session.login_method, LoginMethod::SessionBridge);
        assert_eq!(location, "/dashboard/5");

        let req = TestRequest::default().cookie(cookie).to_http_request();
        assert_eq!(sessions.current_user(&req).unwrap().email, "a@x.com");
    }

    #[actix_web::test]
    async fn test_email_match_ignores_case() {
        let (bridge, _) = make_bridge(MockVerifier::accepting("A@X.COM"));
        let outcome = bridge.authenticate(&request("/login/", Some("valid"))).await;
        assert!(outcome.is_authenticated());
    }

    #[actix_web::test]
    async fn test_unsafe_redirect_goes_to_index() {
        let (bridge, _) = make_bridge(MockVerifier::accepting("a@x.com"));
        let outcome = bridge
            .authenticate(&request(
                "/login/?redirect=https%3A%2F%2Fattacker.test",
                Some("valid"),
            ))
            .await;
        assert!(matches!(
            outcome,
            BridgeOutcome::Authenticated { location, .. } if location == "/superset/welcome/"
        ));
    }

    #[actix_web::test]
    async fn test_rejected_cookie() {
        let (bridge, _) = make_bridge(MockVerifier::failing(VerifyFailure::Revoked));
        let outcome = bridge.authenticate(&request("/login/", Some("revoked"))).await;
        assert!(matches!(
            outcome,
            BridgeOutcome::Rejected(VerifyFailure::Revoked)
        ));
    }

    #[actix_web::test]
    async fn test_unknown_and_inactive_users_are_misses() {
        let (bridge, _) = make_bridge(MockVerifier::accepting("nobody@x.com"));
        let outcome = bridge.authenticate(&request("/login/", Some("valid"))).await;
        assert!(matches!(outcome, BridgeOutcome::UnknownUser(email) if email == "nobody@x.com"));

        let (bridge, _) = make_bridge(MockVerifier::accepting(TestFixtures::INACTIVE_EMAIL));
        let outcome = bridge.authenticate(&request("/login/", Some("valid"))).await;
        assert!(matches!(outcome, BridgeOutcome::UnknownUser(_)));
    }

    #[actix_web::test]
    async fn test_missing_email_claim() {
        let (bridge, _) = make_bridge(MockVerifier::without_email());
        let outcome = bridge.authenticate(&request("/login/", Some("valid"))).await;
        assert!(matches!(outcome, BridgeOutcome::NoEmailClaim));
    }

    #[actix_web::test]
    async fn test_login_or_else_passes_fallback_through() {
        let (bridge, _) = make_bridge(MockVerifier::failing(VerifyFailure::Expired));
        let response = bridge
            .login_or_else(&request("/login/", Some("expired")), fallback)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.cookies().count(), 0);
    }

    #[actix_web::test]
    async fn test_login_or_else_redirects_on_success() {
        let (bridge, _) = make_bridge(MockVerifier::accepting("a@x.com"));
        let response = bridge
            .login_or_else(&request("/login/", Some("valid")), fallback)
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/superset/welcome/"
        );
        assert!(response.cookies().any(|c| c.name() == "reportsession"));
    }
}
