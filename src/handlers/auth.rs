// Login and logout handlers
//
// These only translate HTTP into `LoginView` calls. The bridged views decide
// everything and always produce a response.

use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::error;

use crate::authentication::{LoginForm, LoginRequest, LoginViews};
use crate::oauth::OAuthCallback;
use crate::session::{external_cookie_removal, SessionManager};
use crate::settings::ReportgateSettings;
use crate::utils::ResponseBuilder;

/// `GET /login/`
///
/// # Errors
///
/// Never fails; every login outcome is a response
pub async fn login_page(req: HttpRequest, views: web::Data<LoginViews>) -> Result<HttpResponse> {
    Ok(views.login.login(&req, LoginRequest::page()).await)
}

/// `POST /login/` with the credential form
///
/// # Errors
///
/// Never fails; every login outcome is a response
pub async fn login_submit(
    req: HttpRequest,
    form: web::Form<LoginForm>,
    views: web::Data<LoginViews>,
) -> Result<HttpResponse> {
    Ok(views
        .login
        .login(&req, LoginRequest::submit(form.into_inner()))
        .await)
}

/// `GET /login/{provider}`, only served by the OAuth variant
///
/// # Errors
///
/// Never fails; every login outcome is a response
pub async fn login_provider(
    req: HttpRequest,
    path: web::Path<String>,
    views: web::Data<LoginViews>,
) -> Result<HttpResponse> {
    if views.oauth.is_none() {
        return Ok(ResponseBuilder::not_found()
            .with_error_code("provider_login_disabled")
            .with_message("Provider login is not enabled")
            .build());
    }

    let provider = path.into_inner();
    Ok(views
        .login
        .login(&req, LoginRequest::provider(&provider))
        .await)
}

/// `GET /oauth-authorized/{provider}`
///
/// # Errors
///
/// Never fails; callback failures redirect to the login page
pub async fn oauth_authorized(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<OAuthCallback>,
    views: web::Data<LoginViews>,
) -> Result<HttpResponse> {
    let Some(oauth) = views.oauth.as_ref() else {
        return Ok(ResponseBuilder::not_found()
            .with_error_code("provider_login_disabled")
            .with_message("Provider login is not enabled")
            .build());
    };

    Ok(oauth.authorized(&req, &path, &query).await)
}

/// `GET|POST /logout/`
///
/// # Errors
///
/// Never fails; the logout hook always yields a response
pub async fn logout(
    req: HttpRequest,
    views: web::Data<LoginViews>,
    sessions: web::Data<SessionManager>,
    settings: web::Data<ReportgateSettings>,
) -> Result<HttpResponse> {
    match views.login.logout(&req).await {
        Ok(response) => Ok(response),
        Err(e) => {
            error!("Logout failed: {e}");
            Ok(ResponseBuilder::redirect(&settings.application.login_url)
                .with_cookie(sessions.clear_session_cookie())
                .with_cookie(external_cookie_removal(&settings.external_cookie))
                .build())
        }
    }
}
