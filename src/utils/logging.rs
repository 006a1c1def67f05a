// Centralized logging for the recurring authentication log lines
use log::{debug, error, info, warn};

use crate::identity::VerifyFailure;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log that the external session cookie was found and is being verified
    pub fn log_bridge_cookie_found(cookie_name: &str) {
        info!("External session cookie '{cookie_name}' found, verifying");
    }

    /// Log a rejected external session cookie
    pub fn log_bridge_rejected(reason: &VerifyFailure) {
        error!("Invalid external session: {reason}");
    }

    /// Log a verified cookie whose email has no local account
    pub fn log_bridge_unknown_user(email: &str) {
        info!("No local user for bridged email {email}, falling back to login view");
    }

    /// Log a verified cookie without an email claim
    pub fn log_bridge_missing_email(subject: &str) {
        info!("External session for {subject} carries no email claim, falling back to login view");
    }

    /// Log a successful bridge login
    pub fn log_bridge_login(email: &str, location: &str) {
        info!("Logged in {email} from external session, redirecting to {location}");
    }

    /// Log provider initialization status
    pub fn log_provider_init(provider_name: &str, display_name: Option<&str>, configured: bool) {
        let name = display_name.unwrap_or(provider_name);
        if configured {
            info!("✅ {name} OAuth2 configured ({provider_name})");
        } else {
            info!("❌ {name} OAuth2 not configured - missing client credentials");
        }
    }

    /// Log that a provider is disabled
    pub fn log_oauth_provider_disabled(provider_name: &str) {
        info!("⏭️  Provider {provider_name} is disabled, skipping");
    }

    /// Log OAuth URL building
    pub fn log_oauth_url_built(provider: &str, scopes: &str, state_in_redirect_uri: bool) {
        debug!(
            "Built {provider} OAuth URL with scopes: {scopes} (state in redirect_uri: {state_in_redirect_uri})"
        );
    }

    /// Log token exchange start
    pub fn log_token_exchange_start(provider: &str) {
        info!("🔄 Exchanging authorization code for tokens with {provider}");
    }

    /// Log an authorization handshake that could not be started
    pub fn log_authorize_failure(provider: &str, reason: &dyn std::fmt::Display) {
        error!("Error on OAuth authorize for {provider}: {reason}");
    }

    /// Log a failed OAuth callback
    pub fn log_callback_failure(provider: &str, reason: &dyn std::fmt::Display) {
        warn!("OAuth callback for {provider} failed: {reason}");
    }

    /// Log session creation success
    pub fn log_session_created(user_email: &str, method: &str) {
        info!("Established local session for {user_email} ({method})");
    }
}
