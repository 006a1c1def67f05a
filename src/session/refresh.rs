// Sliding expiry for the local session
//
// Every response to a request carrying a valid session re-issues the session
// cookie with a fresh expiry, unless the handler already set that cookie
// (login, logout).

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error};

use super::SessionManager;

/// Middleware body for `actix_web::middleware::from_fn`
///
/// # Errors
///
/// Propagates errors from the wrapped service, or a failure to append the cookie header
pub async fn refresh_session(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let refreshed = req
        .app_data::<web::Data<SessionManager>>()
        .and_then(|sessions| sessions.refreshed_cookie(req.request()));

    let mut res = next.call(req).await?;

    if let Some(cookie) = refreshed {
        let already_set = res
            .response()
            .cookies()
            .any(|set| set.name() == cookie.name());
        if !already_set {
            res.response_mut().add_cookie(&cookie)?;
        }
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoginMethod;
    use crate::testing::fixtures::TestFixtures;
    use actix_web::{middleware::from_fn, test, App, HttpResponse};

    async fn page() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    async fn sets_own_cookie(sessions: web::Data<SessionManager>) -> HttpResponse {
        HttpResponse::Ok()
            .cookie(sessions.clear_session_cookie())
            .finish()
    }

    #[actix_web::test]
    async fn test_valid_session_is_refreshed() {
        let sessions = SessionManager::new(b"refresh-secret", true, "reportsession", 30);
        let (_, cookie) = sessions
            .login_user(&TestFixtures::local_user(1, "a@x.com"), LoginMethod::Database)
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sessions))
                .wrap(from_fn(refresh_session))
                .route("/page", web::get().to(page)),
        )
        .await;

        let req = test::TestRequest::get().uri("/page").cookie(cookie).to_request();
        let res = test::call_service(&app, req).await;
        assert!(res
            .response()
            .cookies()
            .any(|c| c.name() == "reportsession" && !c.value().is_empty()));
    }

    #[actix_web::test]
    async fn test_anonymous_request_is_untouched() {
        let sessions = SessionManager::new(b"refresh-secret", true, "reportsession", 30);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sessions))
                .wrap(from_fn(refresh_session))
                .route("/page", web::get().to(page)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/page").to_request()).await;
        assert_eq!(res.response().cookies().count(), 0);
    }

    #[actix_web::test]
    async fn test_handler_cookie_wins() {
        let sessions = SessionManager::new(b"refresh-secret", true, "reportsession", 30);
        let (_, cookie) = sessions
            .login_user(&TestFixtures::local_user(1, "a@x.com"), LoginMethod::Database)
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(sessions))
                .wrap(from_fn(refresh_session))
                .route("/logout", web::get().to(sets_own_cookie)),
        )
        .await;

        let req = test::TestRequest::get().uri("/logout").cookie(cookie).to_request();
        let res = test::call_service(&app, req).await;
        let cookies: Vec<_> = res
            .response()
            .cookies()
            .filter(|c| c.name() == "reportsession")
            .collect();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value(), "");
    }
}
