use actix_web::{web, HttpRequest, HttpResponse, Result};

use crate::fiscal::FiscalYear;
use crate::models::CurrentUserResponse;
use crate::session::SessionManager;
use crate::users::UserDirectory;
use crate::utils::ResponseBuilder;

/// Fiscal year read at startup, `None` when the read is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct FiscalYearState(pub Option<FiscalYear>);

/// `GET /api/me`: the logged-in user, or 401
///
/// # Errors
///
/// Never fails; an unreadable session is reported as 401
pub async fn current_user(
    req: HttpRequest,
    sessions: web::Data<SessionManager>,
    directory: web::Data<dyn UserDirectory>,
) -> Result<HttpResponse> {
    let Some(session) = sessions.current_user(&req) else {
        return Ok(ResponseBuilder::unauthorized()
            .with_error_code("not_authenticated")
            .with_message("No active session")
            .build());
    };

    let user = match directory.find_user(&session.email).await {
        Ok(user) => user,
        Err(e) => {
            log::warn!("User directory lookup failed for {}: {e}", session.email);
            None
        }
    };

    Ok(HttpResponse::Ok().json(CurrentUserResponse::new(&session, user.as_ref())))
}

/// `GET /api/fiscal-year`
///
/// # Errors
///
/// Never fails; 404 when no fiscal year was loaded
pub async fn fiscal_year(state: web::Data<FiscalYearState>) -> Result<HttpResponse> {
    match state.0 {
        Some(fiscal_year) => Ok(HttpResponse::Ok().json(fiscal_year)),
        None => Ok(ResponseBuilder::not_found()
            .with_error_code("fiscal_year_unavailable")
            .with_message("Fiscal year configuration is not loaded")
            .build()),
    }
}
