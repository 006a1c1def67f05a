use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;

use super::bridge::SessionBridge;
use super::logout::LogoutHook;
use super::traits::{LoginRequest, LoginView, LogoutError};

/// Wraps a base login view with the session bridge and the logout hook
///
/// Login requests without a provider try the external session first and fall
/// back to the base view unchanged. Provider requests, and requests that already
/// hold a local session, go straight to the base view.
pub struct BridgedLoginView<V> {
    base: V,
    bridge: Arc<SessionBridge>,
    logout_hook: LogoutHook,
}

impl<V: LoginView> BridgedLoginView<V> {
    #[must_use]
    pub fn new(base: V, bridge: Arc<SessionBridge>, logout_hook: LogoutHook) -> Self {
        Self {
            base,
            bridge,
            logout_hook,
        }
    }
}

#[async_trait(?Send)]
impl<V: LoginView> LoginView for BridgedLoginView<V> {
    async fn login(&self, req: &HttpRequest, login: LoginRequest) -> HttpResponse {
        if login.provider.is_some() || self.bridge.has_local_session(req) {
            return self.base.login(req, login).await;
        }

        self.bridge
            .login_or_else(req, || self.base.login(req, login))
            .await
    }

    async fn logout(&self, req: &HttpRequest) -> Result<HttpResponse, LogoutError> {
        let base = self.base.logout(req).await;
        Ok(self.logout_hook.finish(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::VerifyFailure;
    use crate::models::LoginMethod;
    use crate::testing::fixtures::TestFixtures;
    use crate::testing::mock::{MockLoginView, MockVerifier};
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;

    fn view(verifier: MockVerifier, base: MockLoginView) -> BridgedLoginView<MockLoginView> {
        let settings = TestFixtures::settings();
        let sessions = TestFixtures::session_manager();
        let bridge = Arc::new(SessionBridge::new(
            Arc::new(verifier),
            TestFixtures::directory(),
            sessions.clone(),
            &settings,
        ));
        BridgedLoginView::new(base, bridge, LogoutHook::new(&settings, sessions))
    }

    fn with_cookie() -> HttpRequest {
        TestRequest::get()
            .uri("/login/")
            .cookie(Cookie::new("session", "whatever"))
            .to_http_request()
    }

    #[actix_web::test]
    async fn test_rejected_cookie_reaches_base_view() {
        let base = MockLoginView::new();
        let view = view(MockVerifier::failing(VerifyFailure::SignatureInvalid), base.clone());

        let response = view.login(&with_cookie(), LoginRequest::page()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(base.login_calls(), 1);
    }

    #[actix_web::test]
    async fn test_bridged_login_skips_base_view() {
        let base = MockLoginView::new();
        let view = view(MockVerifier::accepting("a@x.com"), base.clone());

        let response = view.login(&with_cookie(), LoginRequest::page()).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(base.login_calls(), 0);
    }

    #[actix_web::test]
    async fn test_provider_login_bypasses_bridge() {
        let base = MockLoginView::new();
        let verifier = MockVerifier::accepting("a@x.com");
        let view = view(verifier.clone(), base.clone());

        view.login(&with_cookie(), LoginRequest::provider("google"))
            .await;
        assert_eq!(base.login_calls(), 1);
        assert_eq!(verifier.calls(), 0);
    }

    #[actix_web::test]
    async fn test_existing_local_session_skips_bridge() {
        let base = MockLoginView::new();
        let verifier = MockVerifier::accepting("a@x.com");
        let view = view(verifier.clone(), base.clone());

        let (_, local) = TestFixtures::session_manager()
            .login_user(&TestFixtures::local_user(1, "a@x.com"), LoginMethod::Database)
            .unwrap();
        let req = TestRequest::get()
            .uri("/login/?redirect=%2Fdashboard%2F5")
            .cookie(Cookie::new("session", "whatever"))
            .cookie(local)
            .to_http_request();

        view.login(&req, LoginRequest::page()).await;
        assert_eq!(base.login_calls(), 1);
        assert_eq!(verifier.calls(), 0);
    }

    #[actix_web::test]
    async fn test_logout_survives_failing_base() {
        let view = view(MockVerifier::accepting("a@x.com"), MockLoginView::failing_logout());
        let req = TestRequest::get().uri("/logout/").to_http_request();

        for _ in 0..2 {
            let response = view.logout(&req).await.unwrap();
            assert_eq!(response.status(), StatusCode::FOUND);
            assert!(response
                .cookies()
                .any(|c| c.name() == "session" && c.value().is_empty()));
        }
    }
}
