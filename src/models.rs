use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::LocalUser;

/// How the current local session was established
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "provider", rename_all = "snake_case")]
pub enum LoginMethod {
    SessionBridge,
    Database,
    #[serde(rename = "oauth")]
    OAuth(String),
}

impl std::fmt::Display for LoginMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionBridge => write!(f, "session_bridge"),
            Self::Database => write!(f, "db"),
            Self::OAuth(provider) => write!(f, "oauth:{provider}"),
        }
    }
}

/// Payload of the encrypted local session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub session_id: Uuid,
    pub user_id: u64,
    pub username: String,
    pub email: String,
    pub login_method: LoginMethod,
    pub authenticated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionUser {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// One-shot user-visible message carried to the next rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub category: String,
    pub message: String,
}

impl FlashMessage {
    #[must_use]
    pub fn warning(message: &str) -> Self {
        Self {
            category: "warning".to_string(),
            message: message.to_string(),
        }
    }
}

/// Identity attributes returned by an OAuth provider's userinfo endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthUserInfo {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl OAuthUserInfo {
    /// Map a userinfo document for `provider`
    ///
    /// Google accounts use their email as the username. Other providers fall back
    /// from `preferred_username` to the email.
    #[must_use]
    pub fn from_userinfo(provider: &str, data: &serde_json::Value) -> Self {
        let field = |name: &str| {
            data.get(name)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let email = field("email");

        if provider == "google" {
            return Self {
                username: email.clone(),
                first_name: field("given_name"),
                last_name: field("family_name"),
                email,
            };
        }

        let username = Some(field("preferred_username"))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.clone());
        let (first_name, last_name) = match (field("given_name"), field("family_name")) {
            (first, last) if !first.is_empty() || !last.is_empty() => (first, last),
            _ => {
                let name = field("name");
                match name.split_once(' ') {
                    Some((first, last)) => (first.to_string(), last.to_string()),
                    None => (name, String::new()),
                }
            }
        };

        Self {
            username,
            first_name,
            last_name,
            email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Body of `/api/me`
#[derive(Debug, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
    pub login_method: String,
    pub expires_at: DateTime<Utc>,
}

impl CurrentUserResponse {
    #[must_use]
    pub fn new(session: &SessionUser, user: Option<&LocalUser>) -> Self {
        Self {
            username: session.username.clone(),
            email: session.email.clone(),
            first_name: user.map(|u| u.first_name.clone()).unwrap_or_default(),
            last_name: user.map(|u| u.last_name.clone()).unwrap_or_default(),
            roles: user.map(|u| u.roles.clone()).unwrap_or_default(),
            login_method: session.login_method.to_string(),
            expires_at: session.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_google_userinfo_uses_email_as_username() {
        let info = OAuthUserInfo::from_userinfo(
            "google",
            &json!({
                "email": "ada@insentric.net",
                "given_name": "Ada",
                "family_name": "Lovelace",
                "name": "Ada Lovelace"
            }),
        );
        assert_eq!(info.username, "ada@insentric.net");
        assert_eq!(info.first_name, "Ada");
        assert_eq!(info.last_name, "Lovelace");
        assert_eq!(info.email, "ada@insentric.net");
    }

    #[test]
    fn test_google_userinfo_missing_names_default_empty() {
        let info = OAuthUserInfo::from_userinfo("google", &json!({ "email": "a@x.com" }));
        assert_eq!(info.first_name, "");
        assert_eq!(info.last_name, "");
    }

    #[test]
    fn test_generic_userinfo_splits_name() {
        let info = OAuthUserInfo::from_userinfo(
            "azure",
            &json!({ "email": "g@x.com", "preferred_username": "grace", "name": "Grace Hopper" }),
        );
        assert_eq!(info.username, "grace");
        assert_eq!(info.first_name, "Grace");
        assert_eq!(info.last_name, "Hopper");
    }

    #[test]
    fn test_login_method_display() {
        assert_eq!(LoginMethod::SessionBridge.to_string(), "session_bridge");
        assert_eq!(LoginMethod::OAuth("google".into()).to_string(), "oauth:google");
    }
}
