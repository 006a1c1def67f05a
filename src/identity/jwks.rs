// JWKS structures and the signing key cache

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::VerifyFailure;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKey {
    pub kty: String,         // Key type (RSA, EC)
    pub kid: Option<String>, // Key ID
    pub alg: Option<String>, // Algorithm (RS256, ES256)
    #[serde(rename = "use")]
    pub key_use: Option<String>, // "sig" for signing

    // RSA keys
    pub n: Option<String>, // Modulus
    pub e: Option<String>, // Exponent

    // EC keys
    pub crv: Option<String>, // Curve
    pub x: Option<String>,   // X coordinate
    pub y: Option<String>,   // Y coordinate
}

/// Signing keys of the session cookie issuer, keyed by key id
pub struct JwksCache {
    keys: HashMap<String, JsonWebKey>,

    last_updated: Option<DateTime<Utc>>,

    // Failed fetch tracking for backoff
    last_failure: Option<DateTime<Utc>>,

    cache_duration: Duration,
    retry_backoff: Duration,
}

impl Default for JwksCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl JwksCache {
    #[must_use]
    pub fn new(cache_duration: Duration) -> Self {
        Self {
            keys: HashMap::new(),
            last_updated: None,
            last_failure: None,
            cache_duration,
            retry_backoff: Duration::from_secs(60),
        }
    }

    fn elapsed_since(instant: Option<DateTime<Utc>>) -> Option<Duration> {
        instant.map(|at| {
            Utc::now()
                .signed_duration_since(at)
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }

    /// Check if cached keys are still fresh
    #[must_use]
    pub fn is_cache_valid(&self) -> bool {
        Self::elapsed_since(self.last_updated).is_some_and(|elapsed| elapsed < self.cache_duration)
    }

    /// A fetch may be attempted unless one failed within the backoff window
    #[must_use]
    pub fn should_retry_fetch(&self) -> bool {
        Self::elapsed_since(self.last_failure).is_none_or(|elapsed| elapsed >= self.retry_backoff)
    }

    /// Fresh keys are refetched for an unknown key id at most once per backoff window
    #[must_use]
    pub fn may_refresh_for_unknown_kid(&self) -> bool {
        Self::elapsed_since(self.last_updated).is_none_or(|elapsed| elapsed >= self.retry_backoff)
    }

    #[must_use]
    pub fn get_key(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.get(kid)
    }

    /// Replace the cached key set; keys without a key id cannot be selected and are skipped
    pub fn store_keys(&mut self, keys: Vec<JsonWebKey>) {
        self.keys = keys
            .into_iter()
            .filter_map(|key| key.kid.clone().map(|kid| (kid, key)))
            .collect();

        debug!("Cached {} session cookie signing keys", self.keys.len());
        self.last_updated = Some(Utc::now());
        self.last_failure = None;
    }

    pub fn record_fetch_failure(&mut self) {
        self.last_failure = Some(Utc::now());
    }
}

/// Fetch a JWKS document
///
/// # Errors
///
/// Returns [`VerifyFailure::KeyFetch`] on transport errors, non-success status or invalid JSON
pub async fn fetch_jwks(
    client: &reqwest::Client,
    jwks_uri: &str,
) -> Result<JsonWebKeySet, VerifyFailure> {
    debug!("Fetching JWKS from: {jwks_uri}");

    let response = client
        .get(jwks_uri)
        .send()
        .await
        .map_err(|e| VerifyFailure::KeyFetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(VerifyFailure::KeyFetch(format!(
            "JWKS request failed with status: {}",
            response.status()
        )));
    }

    response
        .json::<JsonWebKeySet>()
        .await
        .map_err(|e| VerifyFailure::KeyFetch(format!("Failed to parse JWKS JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_key(kid: Option<&str>) -> JsonWebKey {
        JsonWebKey {
            kty: "RSA".to_string(),
            kid: kid.map(ToString::to_string),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            n: Some("AQAB".to_string()),
            e: Some("AQAB".to_string()),
            crv: None,
            x: None,
            y: None,
        }
    }

    #[test]
    fn test_empty_cache_is_invalid() {
        let cache = JwksCache::default();
        assert!(!cache.is_cache_valid());
        assert!(cache.should_retry_fetch());
        assert!(cache.may_refresh_for_unknown_kid());
    }

    #[test]
    fn test_store_keys_indexes_by_kid() {
        let mut cache = JwksCache::default();
        cache.store_keys(vec![rsa_key(Some("k1")), rsa_key(Some("k2")), rsa_key(None)]);

        assert!(cache.is_cache_valid());
        assert!(cache.get_key("k1").is_some());
        assert!(cache.get_key("k2").is_some());
        assert!(cache.get_key("k3").is_none());
        // Just refreshed, so an unknown kid does not trigger another fetch
        assert!(!cache.may_refresh_for_unknown_kid());
    }

    #[test]
    fn test_failure_backoff() {
        let mut cache = JwksCache::default();
        cache.record_fetch_failure();
        assert!(!cache.should_retry_fetch());

        cache.store_keys(vec![rsa_key(Some("k1"))]);
        assert!(cache.should_retry_fetch());
    }

    #[test]
    fn test_zero_duration_cache_is_never_valid() {
        let mut cache = JwksCache::new(Duration::ZERO);
        cache.store_keys(vec![rsa_key(Some("k1"))]);
        assert!(!cache.is_cache_valid());
    }

    #[test]
    fn test_jwks_document_parses() {
        let jwks: JsonWebKeySet = serde_json::from_str(
            r#"{"keys":[{"kty":"RSA","kid":"abc","alg":"RS256","use":"sig","n":"xyz","e":"AQAB"}]}"#,
        )
        .unwrap();
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].key_use.as_deref(), Some("sig"));
    }
}
