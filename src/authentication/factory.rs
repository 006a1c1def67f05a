//! Factory for the configured login views
//!
//! Picks the base view from `auth.auth_type` and wraps it with the session
//! bridge and logout hook, so both login variants share one bridge.

use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::bridge::SessionBridge;
use super::bridged::BridgedLoginView;
use super::database::DatabaseLoginView;
use super::logout::LogoutHook;
use super::oauth::OAuthLoginView;
use super::traits::LoginView;
use crate::identity::SessionCookieVerifier;
use crate::oauth::OAuthProviderClient;
use crate::session::SessionManager;
use crate::settings::{AuthType, ReportgateSettings};
use crate::users::UserDirectory;

/// Collaborators the login views are built from, constructed once at startup
#[derive(Clone)]
pub struct LoginServices {
    pub verifier: Arc<dyn SessionCookieVerifier>,
    pub directory: Arc<dyn UserDirectory>,
    pub sessions: SessionManager,
    /// Required when `auth_type = oauth`
    pub oauth_client: Option<Arc<dyn OAuthProviderClient>>,
}

/// The views the HTTP layer dispatches to
#[derive(Clone)]
pub struct LoginViews {
    /// Bridged login/logout for the configured variant
    pub login: Arc<dyn LoginView>,
    /// Provider callback handler, present for the OAuth variant
    pub oauth: Option<Arc<OAuthLoginView>>,
}

pub struct LoginViewFactory;

impl LoginViewFactory {
    /// Build the login views for `settings`
    ///
    /// # Errors
    ///
    /// Returns an error when the OAuth variant is configured without a provider client
    pub fn create(settings: &ReportgateSettings, services: LoginServices) -> Result<LoginViews> {
        log::info!("🏭 Building login views...");

        let bridge = Arc::new(SessionBridge::new(
            services.verifier,
            Arc::clone(&services.directory),
            services.sessions.clone(),
            settings,
        ));
        let logout_hook = LogoutHook::new(settings, services.sessions.clone());

        let views = match settings.auth.auth_type {
            AuthType::Db => {
                let base = DatabaseLoginView::new(services.directory, services.sessions, settings);
                log::info!("✅ Database login with session bridge");
                LoginViews {
                    login: Arc::new(BridgedLoginView::new(base, bridge, logout_hook)),
                    oauth: None,
                }
            }
            AuthType::Oauth => {
                let client = services
                    .oauth_client
                    .ok_or_else(|| anyhow!("OAuth login configured without any provider"))?;
                for provider in client.providers() {
                    log::info!("   └─ {} ({})", provider.label, provider.name);
                }

                let base = Arc::new(OAuthLoginView::new(
                    client,
                    services.directory,
                    services.sessions,
                    settings,
                ));
                log::info!("✅ OAuth login with session bridge");
                LoginViews {
                    login: Arc::new(BridgedLoginView::new(
                        Arc::clone(&base),
                        bridge,
                        logout_hook,
                    )),
                    oauth: Some(base),
                }
            }
        };

        Ok(views)
    }
}
