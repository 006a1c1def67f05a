// HTTP request handlers for the login gateway
pub mod api;
pub mod auth;
pub mod health;


use std::sync::Arc;

use actix_web::web;

pub use api::{current_user, fiscal_year, FiscalYearState};
pub use auth::{login_page, login_provider, login_submit, logout, oauth_authorized};
pub use health::health;

use crate::authentication::LoginViews;
use crate::session::SessionManager;
use crate::settings::ReportgateSettings;
use crate::users::UserDirectory;

/// Everything the handlers extract, built once at startup and shared by all workers
#[derive(Clone)]
pub struct AppState {
    pub settings: ReportgateSettings,
    pub sessions: SessionManager,
    pub directory: Arc<dyn UserDirectory>,
    pub views: LoginViews,
    pub fiscal_year: FiscalYearState,
}

impl AppState {
    /// Register the shared state and every gateway route
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.settings.clone()))
            .app_data(web::Data::new(self.sessions.clone()))
            .app_data(web::Data::from(Arc::clone(&self.directory)))
            .app_data(web::Data::new(self.views.clone()))
            .app_data(web::Data::new(self.fiscal_year));
        configure_services(cfg);
    }
}

fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg
        // Login and logout
        .route("/login/", web::get().to(login_page))
        .route("/login/", web::post().to(login_submit))
        .route("/login/{provider}", web::get().to(login_provider))
        .route("/oauth-authorized/{provider}", web::get().to(oauth_authorized))
        .route("/logout/", web::get().to(logout))
        .route("/logout/", web::post().to(logout))
        // JSON API
        .route("/api/me", web::get().to(current_user))
        .route("/api/fiscal-year", web::get().to(fiscal_year))
        // Health endpoint
        .route("/ping", web::get().to(health));
}
