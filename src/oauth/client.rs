use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::OAuthError;
use crate::models::OAuthUserInfo;
use crate::settings::{ProviderSettings, ReportgateSettings};
use crate::utils::LoggingHelper;

/// A provider offered on the login page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLink {
    pub name: String,
    pub label: String,
}

/// The provider side of the authorization-code handshake
#[async_trait]
pub trait OAuthProviderClient: Send + Sync {
    /// Providers that can be used, in configuration order
    fn providers(&self) -> Vec<ProviderLink>;

    /// Authorization URL carrying `state`
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unknown or misconfigured
    fn authorize_url(&self, provider: &str, state: &str) -> Result<String, OAuthError>;

    /// Exchange an authorization code for an access token
    async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
        state: &str,
    ) -> Result<String, OAuthError>;

    async fn user_info(&self, provider: &str, access_token: &str)
        -> Result<OAuthUserInfo, OAuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: Option<String>,
    scope: Option<String>,
}

/// Provider configuration with resolved endpoints and credentials
#[derive(Debug, Clone)]
pub struct RuntimeProvider {
    pub settings: ProviderSettings,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl RuntimeProvider {
    /// # Errors
    ///
    /// Returns [`OAuthError::Configuration`] when the client id or an endpoint is missing
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, OAuthError> {
        let client_id = settings.get_client_id().ok_or_else(|| {
            OAuthError::Configuration(format!("Missing client_id for provider {}", settings.name))
        })?;

        let (default_auth, default_token, default_userinfo) = match settings.name.as_str() {
            "google" => (
                Some("https://accounts.google.com/o/oauth2/v2/auth"),
                Some("https://oauth2.googleapis.com/token"),
                Some("https://www.googleapis.com/oauth2/v2/userinfo"),
            ),
            _ => (None, None, None),
        };

        let endpoint = |configured: &Option<String>, default: Option<&str>, what: &str| {
            configured
                .clone()
                .or_else(|| default.map(ToString::to_string))
                .ok_or_else(|| {
                    OAuthError::Configuration(format!(
                        "Provider {} missing {what}",
                        settings.name
                    ))
                })
        };

        Ok(Self {
            client_id,
            client_secret: settings.get_client_secret(),
            auth_url: endpoint(
                &settings.authorization_endpoint,
                default_auth,
                "authorization_endpoint",
            )?,
            token_url: endpoint(&settings.token_endpoint, default_token, "token_endpoint")?,
            userinfo_url: endpoint(
                &settings.userinfo_endpoint,
                default_userinfo,
                "userinfo_endpoint",
            )?,
            settings: settings.clone(),
        })
    }
}

/// Authorization-code client speaking plain OAuth 2.0 over HTTP
pub struct HttpOAuthClient {
    providers: Vec<RuntimeProvider>,
    redirect_base_url: String,
    http_client: reqwest::Client,
}

impl HttpOAuthClient {
    /// Resolve every enabled provider; providers without credentials are skipped
    ///
    /// # Errors
    ///
    /// Returns an error when no provider ends up usable
    pub fn from_settings(settings: &ReportgateSettings) -> Result<Self, OAuthError> {
        let mut providers = Vec::new();

        for provider_settings in &settings.providers {
            if !provider_settings.enabled {
                LoggingHelper::log_oauth_provider_disabled(&provider_settings.name);
                continue;
            }

            match RuntimeProvider::from_settings(provider_settings) {
                Ok(provider) => {
                    LoggingHelper::log_provider_init(
                        &provider_settings.name,
                        provider_settings.display_name.as_deref(),
                        true,
                    );
                    providers.push(provider);
                }
                Err(e) => {
                    log::warn!("{e}");
                    LoggingHelper::log_provider_init(
                        &provider_settings.name,
                        provider_settings.display_name.as_deref(),
                        false,
                    );
                }
            }
        }

        if providers.is_empty() {
            return Err(OAuthError::Configuration(
                "No OAuth providers are configured".to_string(),
            ));
        }

        Ok(Self::new(providers, &settings.application.base_url))
    }

    #[must_use]
    pub fn new(providers: Vec<RuntimeProvider>, redirect_base_url: &str) -> Self {
        Self {
            providers,
            redirect_base_url: redirect_base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    fn provider(&self, name: &str) -> Result<&RuntimeProvider, OAuthError> {
        self.providers
            .iter()
            .find(|p| p.settings.name == name)
            .ok_or_else(|| OAuthError::UnknownProvider(name.to_string()))
    }

    /// Callback URL for `provider`; providers that lose the `state` parameter get it embedded here
    fn redirect_uri(&self, provider: &RuntimeProvider, state: &str) -> String {
        let base = format!(
            "{}/oauth-authorized/{}",
            self.redirect_base_url, provider.settings.name
        );
        if provider.settings.carries_state_in_redirect_uri() {
            format!("{base}?state={}", urlencoding::encode(state))
        } else {
            base
        }
    }
}

#[async_trait]
impl OAuthProviderClient for HttpOAuthClient {
    fn providers(&self) -> Vec<ProviderLink> {
        self.providers
            .iter()
            .map(|p| ProviderLink {
                name: p.settings.name.clone(),
                label: p.settings.label().to_string(),
            })
            .collect()
    }

    fn authorize_url(&self, provider: &str, state: &str) -> Result<String, OAuthError> {
        let runtime_provider = self.provider(provider)?;
        let scopes = runtime_provider.settings.scopes.join(" ");
        let state_in_redirect_uri = runtime_provider.settings.carries_state_in_redirect_uri();

        let mut url = url::Url::parse(&runtime_provider.auth_url)
            .map_err(|e| OAuthError::Configuration(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &runtime_provider.client_id)
                .append_pair("redirect_uri", &self.redirect_uri(runtime_provider, state))
                .append_pair("response_type", "code")
                .append_pair("scope", &scopes);
            if !state_in_redirect_uri {
                query.append_pair("state", state);
            }
            for (key, value) in &runtime_provider.settings.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        LoggingHelper::log_oauth_url_built(provider, &scopes, state_in_redirect_uri);
        Ok(url.to_string())
    }

    async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
        state: &str,
    ) -> Result<String, OAuthError> {
        let runtime_provider = self.provider(provider)?;
        let redirect_uri = self.redirect_uri(runtime_provider, state);

        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri.as_str());
        params.insert("client_id", runtime_provider.client_id.as_str());
        if let Some(secret) = &runtime_provider.client_secret {
            params.insert("client_secret", secret.as_str());
        }

        LoggingHelper::log_token_exchange_start(provider);
        let response = self
            .http_client
            .post(&runtime_provider.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OAuthError::TokenExchange(format!(
                "status {status}: {error_text}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::TokenExchange(format!("invalid token response: {e}")))?;

        log::debug!(
            "Token exchange with {provider} succeeded: token_type={:?}, scope={:?}",
            token_response.token_type,
            token_response.scope
        );
        Ok(token_response.access_token)
    }

    async fn user_info(
        &self,
        provider: &str,
        access_token: &str,
    ) -> Result<OAuthUserInfo, OAuthError> {
        let runtime_provider = self.provider(provider)?;

        let response = self
            .http_client
            .get(&runtime_provider.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OAuthError::UserInfo(format!(
                "userinfo request failed with status: {}",
                response.status()
            )));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(format!("invalid userinfo response: {e}")))?;
        log::debug!("User info from {provider}: {data}");

        Ok(OAuthUserInfo::from_userinfo(provider, &data))
    }
}
