use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

use crate::utils::redirect_validator::RedirectPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportgateSettings {
    pub application: ApplicationSettings,
    pub auth: AuthSettings,
    pub identity: IdentitySettings,
    pub external_cookie: ExternalCookieSettings,
    pub session: SessionSettings,
    pub users: UserDirectorySettings,
    pub fiscal: FiscalSettings,
    pub logging: LoggingSettings,
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// External origin of the gateway, used to build OAuth redirect URIs
    pub base_url: String,
    /// Default post-login location
    pub index_url: String,
    pub login_url: String,
    pub cors_origins: String,
}

/// Which login surface backs the bridge when no external session applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    Db,
    Oauth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub auth_type: AuthType,
    pub redirect_policy: RedirectPolicy,
    pub invalid_login_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Identity platform project the session cookies are minted for
    pub project_id: String,
    /// JWKS endpoint holding the session cookie signing keys
    pub jwks_uri: String,
    pub issuer_prefix: String,
    pub check_revoked: bool,
    /// Account lookup endpoint used for the revocation check.
    /// `{project_id}` is substituted.
    pub lookup_endpoint: String,
    /// Environment variable holding the bearer token for the account lookup
    pub access_token_env: String,
    pub clock_skew_seconds: u64,
    pub cache_duration_seconds: u64,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalCookieSettings {
    pub name: String,
    pub domain: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Sliding lifetime of the local session, renewed on every request
    pub lifetime_minutes: u64,
    pub secret: String,
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDirectorySettings {
    pub directory_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FiscalSettings {
    pub enabled: bool,
    /// Documents listing for the `accounts` collection
    pub documents_url: String,
    pub access_token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub display_name: Option<String>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub userinfo_endpoint: Option<String>,
    pub scopes: Vec<String>,

    // Direct values (can be overridden by environment variables)
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    // Environment variable names for overrides
    pub client_id_env: Option<String>,
    pub client_secret_env: Option<String>,

    pub enabled: bool,
    /// Carry the anti-forgery state inside the redirect URI instead of the `state` parameter
    pub state_in_redirect_uri: bool,
    pub extra_auth_params: HashMap<String, String>,
}

/// Configuration problems detected after loading
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] basic_toml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8088,
            base_url: "http://localhost:8088".to_string(),
            index_url: "/superset/welcome/".to_string(),
            login_url: "/login/".to_string(),
            cors_origins: "http://localhost:8088".to_string(),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            auth_type: AuthType::Db,
            redirect_policy: RedirectPolicy::Suffix,
            invalid_login_message: "Invalid login. Please try again.".to_string(),
        }
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            project_id: "insentric-root".to_string(),
            jwks_uri: String::new(),
            issuer_prefix: "https://session.firebase.google.com/".to_string(),
            check_revoked: true,
            lookup_endpoint:
                "https://identitytoolkit.googleapis.com/v1/projects/{project_id}/accounts:lookup"
                    .to_string(),
            access_token_env: "IDENTITY_ACCESS_TOKEN".to_string(),
            clock_skew_seconds: 60,
            cache_duration_seconds: 3600,
            request_timeout_seconds: 10,
        }
    }
}

impl Default for ExternalCookieSettings {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            domain: ".insentric.net".to_string(),
            path: "/".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "reportsession".to_string(),
            lifetime_minutes: 30,
            secret: String::new(), // Will be generated if empty
            secure: true,
        }
    }
}

impl Default for UserDirectorySettings {
    fn default() -> Self {
        Self {
            directory_path: "users.json".to_string(),
        }
    }
}

impl Default for FiscalSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            documents_url: String::new(),
            access_token_env: "FIRESTORE_ACCESS_TOKEN".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: None,
            authorization_endpoint: None,
            token_endpoint: None,
            userinfo_endpoint: None,
            scopes: vec!["openid".to_string(), "email".to_string()],
            client_id: None,
            client_secret: None,
            client_id_env: None,
            client_secret_env: None,
            enabled: true,
            state_in_redirect_uri: false,
            extra_auth_params: HashMap::new(),
        }
    }
}

impl ReportgateSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read or parsed
    /// - The resulting configuration fails validation
    pub fn load() -> Result<Self, SettingsError> {
        Self::initialize_environment();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        settings.validate()?;

        Ok(settings)
    }

    /// Load the `.env` file and initialize logging
    fn initialize_environment() {
        Self::load_env_file();
        // A logger may already be installed by an embedding binary or test harness
        let _ = env_logger::try_init();
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `REPORTGATE_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed
    fn load_base_settings() -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_toml_file(&default_config_path)?;
            log::info!("Loaded base settings from {}", default_config_path.display());
        }

        if let Ok(secrets_dir) = std::env::var("REPORTGATE_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_toml_file(&secrets_path)?;
                log::info!("Overriding settings from {}", secrets_path.display());
            } else {
                log::info!(
                    "REPORTGATE_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for these settings
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, SettingsError> {
        let toml_content = fs::read_to_string(path)?;
        Ok(basic_toml::from_str(&toml_content)?)
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_auth_env_overrides(&mut settings.auth);
        Self::apply_identity_env_overrides(&mut settings.identity);
        Self::apply_external_cookie_env_overrides(&mut settings.external_cookie);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_env_string("USER_DIRECTORY_PATH", &mut settings.users.directory_path);
        Self::apply_env_string("FISCAL_DOCUMENTS_URL", &mut settings.fiscal.documents_url);
        Self::apply_env_string("RUST_LOG", &mut settings.logging.level);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        Self::apply_env_string("HOST", &mut app_settings.host);
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        Self::apply_env_string("BASE_URL", &mut app_settings.base_url);
        Self::apply_env_string("INDEX_URL", &mut app_settings.index_url);
        Self::apply_env_string("CORS_ORIGINS", &mut app_settings.cors_origins);
    }

    /// `AUTH_TYPE=OAUTH` selects the provider login, any other value the database login
    pub fn apply_auth_env_overrides(auth_settings: &mut AuthSettings) {
        if let Ok(auth_type) = std::env::var("AUTH_TYPE") {
            auth_settings.auth_type = if auth_type.eq_ignore_ascii_case("OAUTH") {
                AuthType::Oauth
            } else {
                AuthType::Db
            };
        }
    }

    fn apply_identity_env_overrides(identity_settings: &mut IdentitySettings) {
        Self::apply_env_string("IDENTITY_PROJECT_ID", &mut identity_settings.project_id);
        Self::apply_env_string("IDENTITY_JWKS_URI", &mut identity_settings.jwks_uri);
    }

    fn apply_external_cookie_env_overrides(cookie_settings: &mut ExternalCookieSettings) {
        Self::apply_env_string("EXTERNAL_COOKIE_DOMAIN", &mut cookie_settings.domain);
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        if let Ok(value_str) = std::env::var("SESSION_LIFETIME_MINUTES") {
            if let Ok(value) = value_str.parse::<u64>() {
                session_settings.lifetime_minutes = value;
            }
        }
        if let Ok(cookie_secure_str) = std::env::var("COOKIE_SECURE") {
            if let Ok(cookie_secure) = cookie_secure_str.parse::<bool>() {
                session_settings.secure = cookie_secure;
            }
        }

        Self::handle_session_secret_override(session_settings);
    }

    fn apply_env_string(env_var: &str, target: &mut String) {
        if let Ok(value) = std::env::var(env_var) {
            *target = value;
        }
    }

    /// Helper function to handle session secret environment override and generation
    fn handle_session_secret_override(session_settings: &mut SessionSettings) {
        let env_secret_set = std::env::var("SESSION_SECRET").is_ok_and(|secret| {
            if secret.is_empty() {
                false
            } else {
                session_settings.secret = secret;
                true
            }
        });

        if !env_secret_set && session_settings.secret.is_empty() {
            session_settings.secret = Self::generate_random_session_secret();
            log::warn!(
                "Using an auto-generated session secret; sessions will not survive a restart. \
                 Set SESSION_SECRET or session.secret in Settings.toml"
            );
        }
    }

    /// Generate 32 bytes of entropy for the AES-256 session key
    fn generate_random_session_secret() -> String {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        general_purpose::STANDARD.encode(secret)
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if line.trim_start().starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Reject configurations the gateway cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] naming the first problem found
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.identity.project_id.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "identity.project_id must be set".to_string(),
            ));
        }
        if self.identity.jwks_uri.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "identity.jwks_uri must be set".to_string(),
            ));
        }
        if self.session.lifetime_minutes == 0 {
            return Err(SettingsError::Invalid(
                "session.lifetime_minutes must be greater than zero".to_string(),
            ));
        }
        if self.auth.auth_type == AuthType::Oauth && self.get_enabled_providers().is_empty() {
            return Err(SettingsError::Invalid(
                "auth_type = oauth requires at least one enabled provider".to_string(),
            ));
        }
        if self.fiscal.enabled && self.fiscal.documents_url.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "fiscal.documents_url must be set when fiscal.enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Get enabled providers
    #[must_use]
    pub fn get_enabled_providers(&self) -> Vec<&ProviderSettings> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }
}

impl IdentitySettings {
    /// Issuer the session cookies must carry
    #[must_use]
    pub fn expected_issuer(&self) -> String {
        format!("{}{}", self.issuer_prefix, self.project_id)
    }

    #[must_use]
    pub fn resolved_lookup_endpoint(&self) -> String {
        self.lookup_endpoint.replace("{project_id}", &self.project_id)
    }
}

impl ProviderSettings {
    /// Get the client ID, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_id(&self) -> Option<String> {
        if let Some(env_var) = &self.client_id_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_id.clone()
    }

    /// Get the client secret, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_secret(&self) -> Option<String> {
        if let Some(env_var) = &self.client_secret_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_secret.clone()
    }

    /// Twitter only accepts the state inside the redirect URI
    #[must_use]
    pub fn carries_state_in_redirect_uri(&self) -> bool {
        self.state_in_redirect_uri || self.name == "twitter"
    }

    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}
