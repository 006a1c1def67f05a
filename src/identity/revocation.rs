// Revocation check against the identity platform's account lookup endpoint

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use super::{SessionClaims, VerifyFailure};
use crate::settings::IdentitySettings;

/// Decides whether an otherwise valid session cookie has been revoked
#[async_trait]
pub trait RevocationChecker: Send + Sync {
    /// # Errors
    ///
    /// Returns the failure that makes the cookie unacceptable
    async fn check(&self, claims: &SessionClaims) -> Result<(), VerifyFailure>;
}

#[derive(Debug, Deserialize)]
pub struct AccountLookupResponse {
    #[serde(default)]
    pub users: Vec<AccountRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub local_id: String,
    #[serde(default)]
    pub disabled: bool,
    /// Seconds since the epoch, encoded as a string; sessions authenticated earlier are revoked
    pub valid_since: Option<String>,
}

/// Apply the account state to the cookie's claims
///
/// # Errors
///
/// Returns the revocation reason when the account is missing, disabled, or its
/// tokens were revoked after the cookie's `auth_time`
pub fn evaluate_account(
    response: &AccountLookupResponse,
    claims: &SessionClaims,
) -> Result<(), VerifyFailure> {
    let account = response
        .users
        .iter()
        .find(|user| user.local_id == claims.sub)
        .ok_or(VerifyFailure::AccountNotFound)?;

    if account.disabled {
        return Err(VerifyFailure::AccountDisabled);
    }

    if let Some(valid_since) = &account.valid_since {
        let valid_since: i64 = valid_since
            .parse()
            .map_err(|_| VerifyFailure::RevocationCheck(format!("invalid validSince '{valid_since}'")))?;
        if claims.auth_time < valid_since {
            return Err(VerifyFailure::Revoked);
        }
    }

    Ok(())
}

pub struct AccountLookupRevocationChecker {
    endpoint: String,
    access_token_env: String,
    http: reqwest::Client,
}

impl AccountLookupRevocationChecker {
    #[must_use]
    pub fn new(endpoint: String, access_token_env: String, http: reqwest::Client) -> Self {
        Self {
            endpoint,
            access_token_env,
            http,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &IdentitySettings, http: reqwest::Client) -> Self {
        Self::new(
            settings.resolved_lookup_endpoint(),
            settings.access_token_env.clone(),
            http,
        )
    }
}

#[async_trait]
impl RevocationChecker for AccountLookupRevocationChecker {
    async fn check(&self, claims: &SessionClaims) -> Result<(), VerifyFailure> {
        let token = std::env::var(&self.access_token_env).map_err(|_| {
            VerifyFailure::RevocationCheck(format!(
                "access token variable {} is not set",
                self.access_token_env
            ))
        })?;

        debug!("Checking revocation state for user {}", claims.sub);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&serde_json::json!({ "localId": [claims.sub] }))
            .send()
            .await
            .map_err(|e| VerifyFailure::RevocationCheck(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerifyFailure::RevocationCheck(format!(
                "account lookup failed with status: {}",
                response.status()
            )));
        }

        let lookup: AccountLookupResponse = response
            .json()
            .await
            .map_err(|e| VerifyFailure::RevocationCheck(format!("invalid lookup response: {e}")))?;

        evaluate_account(&lookup, claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(auth_time: i64) -> SessionClaims {
        SessionClaims {
            iss: "https://session.firebase.google.com/p".to_string(),
            aud: "p".to_string(),
            sub: "uid-1".to_string(),
            iat: auth_time,
            exp: auth_time + 3600,
            auth_time,
            email: Some("a@x.com".to_string()),
            email_verified: Some(true),
            name: None,
            extra: serde_json::Map::new(),
        }
    }

    fn lookup(json: &str) -> AccountLookupResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_active_account_passes() {
        let response = lookup(r#"{"users":[{"localId":"uid-1","validSince":"1000"}]}"#);
        assert_eq!(evaluate_account(&response, &claims(2000)), Ok(()));
    }

    #[test]
    fn test_tokens_revoked_after_login() {
        let response = lookup(r#"{"users":[{"localId":"uid-1","validSince":"3000"}]}"#);
        assert_eq!(
            evaluate_account(&response, &claims(2000)),
            Err(VerifyFailure::Revoked)
        );
    }

    #[test]
    fn test_disabled_account() {
        let response = lookup(r#"{"users":[{"localId":"uid-1","disabled":true}]}"#);
        assert_eq!(
            evaluate_account(&response, &claims(2000)),
            Err(VerifyFailure::AccountDisabled)
        );
    }

    #[test]
    fn test_missing_account() {
        let response = lookup("{}");
        assert_eq!(
            evaluate_account(&response, &claims(2000)),
            Err(VerifyFailure::AccountNotFound)
        );
    }

    #[test]
    fn test_unparseable_valid_since() {
        let response = lookup(r#"{"users":[{"localId":"uid-1","validSince":"soon"}]}"#);
        assert!(matches!(
            evaluate_account(&response, &claims(2000)),
            Err(VerifyFailure::RevocationCheck(_))
        ));
    }

    #[actix_web::test]
    async fn test_missing_access_token_fails_check() {
        let checker = AccountLookupRevocationChecker::new(
            "http://127.0.0.1:9/lookup".to_string(),
            "REPORTGATE_TEST_UNSET_TOKEN".to_string(),
            reqwest::Client::new(),
        );
        assert!(matches!(
            checker.check(&claims(2000)).await,
            Err(VerifyFailure::RevocationCheck(_))
        ));
    }
}
