// Session cookie verification against the identity platform's signing keys
// Signature check (RS256, ES256), claim validation and revocation check

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use log::debug;
use serde::Deserialize;
use tokio::sync::RwLock;

use p256::{
    ecdsa::{Signature as EcdsaSignature, VerifyingKey as EcdsaVerifyingKey},
    EncodedPoint,
};
use rsa::{pkcs1v15::VerifyingKey, RsaPublicKey};
use sha2::Sha256;

use super::jwks::{fetch_jwks, JsonWebKey, JsonWebKeySet, JwksCache};
use super::revocation::{AccountLookupRevocationChecker, RevocationChecker};
use super::{SessionClaims, SessionCookieVerifier, VerifyFailure, VerifyResult};
use crate::settings::IdentitySettings;
use crate::utils::crypto::decode_segment;

const MAX_SUBJECT_LENGTH: usize = 128;

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
    kid: Option<String>,
}

/// Claims as they appear on the wire, before validation
#[derive(Debug, Deserialize)]
struct RawClaims {
    iss: Option<String>,
    aud: Option<serde_json::Value>, // string or array
    sub: Option<String>,
    iat: Option<i64>,
    exp: Option<i64>,
    auth_time: Option<i64>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

pub struct IdentityPlatformVerifier {
    project_id: String,
    expected_issuer: String,
    jwks_uri: String,
    clock_skew: i64,
    timeout: Duration,
    keys: Arc<RwLock<JwksCache>>,
    http: reqwest::Client,
    revocation: Option<Arc<dyn RevocationChecker>>,
}

impl IdentityPlatformVerifier {
    /// Build the verifier from settings, with the account lookup revocation
    /// check enabled when `check_revoked` is set
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn from_settings(settings: &IdentitySettings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.request_timeout_seconds);
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let revocation: Option<Arc<dyn RevocationChecker>> = if settings.check_revoked {
            Some(Arc::new(AccountLookupRevocationChecker::from_settings(
                settings,
                http.clone(),
            )))
        } else {
            None
        };

        Ok(Self {
            project_id: settings.project_id.clone(),
            expected_issuer: settings.expected_issuer(),
            jwks_uri: settings.jwks_uri.clone(),
            clock_skew: i64::try_from(settings.clock_skew_seconds).unwrap_or(60),
            timeout,
            keys: Arc::new(RwLock::new(JwksCache::new(Duration::from_secs(
                settings.cache_duration_seconds,
            )))),
            http,
            revocation,
        })
    }

    /// Replace the revocation checker
    #[must_use]
    pub fn with_revocation_checker(mut self, checker: Option<Arc<dyn RevocationChecker>>) -> Self {
        self.revocation = checker;
        self
    }

    /// Seed the key cache, e.g. from a bundled key set
    pub async fn preload_keys(&self, jwks: JsonWebKeySet) {
        self.keys.write().await.store_keys(jwks.keys);
    }

    /// Fetch the signing keys and replace the cache
    ///
    /// # Errors
    ///
    /// Returns [`VerifyFailure::KeyFetch`] if the key endpoint cannot be read
    pub async fn refresh_keys(&self) -> Result<(), VerifyFailure> {
        if !self.keys.read().await.should_retry_fetch() {
            return Err(VerifyFailure::KeyFetch(
                "Skipping fetch due to recent failure and backoff".to_string(),
            ));
        }

        // No lock is held across the request
        match fetch_jwks(&self.http, &self.jwks_uri).await {
            Ok(jwks) => {
                self.keys.write().await.store_keys(jwks.keys);
                Ok(())
            }
            Err(e) => {
                self.keys.write().await.record_fetch_failure();
                Err(e)
            }
        }
    }

    async fn get_public_key(&self, kid: &str) -> Result<JsonWebKey, VerifyFailure> {
        {
            let cache = self.keys.read().await;
            if cache.is_cache_valid() {
                if let Some(key) = cache.get_key(kid) {
                    return Ok(key.clone());
                }
                if !cache.may_refresh_for_unknown_kid() {
                    return Err(VerifyFailure::KeyNotFound(kid.to_string()));
                }
            }
        }

        self.refresh_keys().await?;

        self.keys
            .read()
            .await
            .get_key(kid)
            .cloned()
            .ok_or_else(|| VerifyFailure::KeyNotFound(kid.to_string()))
    }

    /// Full verification without the overall timeout
    ///
    /// # Errors
    ///
    /// Returns the first reason the cookie is not acceptable
    pub async fn verify_token(&self, token: &str) -> Result<SessionClaims, VerifyFailure> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VerifyFailure::Malformed("expected three segments".to_string()));
        };

        let header: JwtHeader = decode_segment(header_b64)
            .map_err(|e| VerifyFailure::Malformed(format!("invalid header: {e}")))?;
        debug!("Session cookie header: alg={}, kid={:?}", header.alg, header.kid);

        match header.alg.as_str() {
            "RS256" | "ES256" => {}
            alg => return Err(VerifyFailure::UnsupportedAlgorithm(alg.to_string())),
        }
        let kid = header.kid.as_deref().ok_or(VerifyFailure::MissingKeyId)?;

        let raw: RawClaims = decode_segment(claims_b64)
            .map_err(|e| VerifyFailure::Malformed(format!("invalid claims: {e}")))?;

        let public_key = self.get_public_key(kid).await?;
        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| VerifyFailure::Malformed(format!("invalid signature encoding: {e}")))?;
        let signing_input = format!("{header_b64}.{claims_b64}");
        verify_signature(&signing_input, &signature, &header.alg, &public_key)?;

        let claims = self.validate_claims(raw, chrono::Utc::now().timestamp())?;

        if let Some(checker) = &self.revocation {
            checker.check(&claims).await?;
        }

        Ok(claims)
    }

    fn validate_claims(&self, raw: RawClaims, now: i64) -> Result<SessionClaims, VerifyFailure> {
        let aud = raw.aud.ok_or(VerifyFailure::MissingClaim("aud"))?;
        let audience_matches = match &aud {
            serde_json::Value::String(aud) => aud == &self.project_id,
            serde_json::Value::Array(auds) => auds
                .iter()
                .any(|aud| aud.as_str() == Some(self.project_id.as_str())),
            _ => false,
        };
        if !audience_matches {
            return Err(VerifyFailure::InvalidClaim {
                claim: "aud",
                expected: self.project_id.clone(),
                actual: aud.to_string(),
            });
        }

        let iss = raw.iss.ok_or(VerifyFailure::MissingClaim("iss"))?;
        if iss != self.expected_issuer {
            return Err(VerifyFailure::InvalidClaim {
                claim: "iss",
                expected: self.expected_issuer.clone(),
                actual: iss,
            });
        }

        let sub = raw.sub.ok_or(VerifyFailure::MissingClaim("sub"))?;
        if sub.is_empty() || sub.len() > MAX_SUBJECT_LENGTH {
            return Err(VerifyFailure::InvalidClaim {
                claim: "sub",
                expected: format!("1 to {MAX_SUBJECT_LENGTH} characters"),
                actual: format!("{} characters", sub.len()),
            });
        }

        let exp = raw.exp.ok_or(VerifyFailure::MissingClaim("exp"))?;
        if now > exp + self.clock_skew {
            return Err(VerifyFailure::Expired);
        }

        let iat = raw.iat.ok_or(VerifyFailure::MissingClaim("iat"))?;
        if iat > now + self.clock_skew {
            return Err(VerifyFailure::NotYetValid("iat"));
        }

        let auth_time = raw.auth_time.ok_or(VerifyFailure::MissingClaim("auth_time"))?;
        if auth_time > now + self.clock_skew {
            return Err(VerifyFailure::NotYetValid("auth_time"));
        }

        let mut rest = raw.rest;
        let email = rest
            .remove("email")
            .and_then(|v| v.as_str().map(ToString::to_string));
        let email_verified = rest
            .remove("email_verified")
            .and_then(|v| v.as_bool());
        let name = rest
            .remove("name")
            .and_then(|v| v.as_str().map(ToString::to_string));

        Ok(SessionClaims {
            iss,
            aud: self.project_id.clone(),
            sub,
            iat,
            exp,
            auth_time,
            email,
            email_verified,
            name,
            extra: rest,
        })
    }
}

#[async_trait]
impl SessionCookieVerifier for IdentityPlatformVerifier {
    async fn verify(&self, session_cookie: &str) -> VerifyResult {
        match tokio::time::timeout(self.timeout, self.verify_token(session_cookie)).await {
            Ok(result) => result.into(),
            Err(_) => VerifyResult::Failed(VerifyFailure::Timeout),
        }
    }
}

fn decode_b64_component(value: Option<&String>, name: &str) -> Result<Vec<u8>, VerifyFailure> {
    let value = value.ok_or_else(|| VerifyFailure::KeyDecoding(format!("missing {name}")))?;
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| VerifyFailure::KeyDecoding(format!("invalid {name} encoding: {e}")))
}

/// Verify a JWS signature with a JWK
///
/// # Errors
///
/// Returns [`VerifyFailure::SignatureInvalid`] when the signature does not match,
/// or a key decoding failure when the JWK does not fit the algorithm
pub fn verify_signature(
    signing_input: &str,
    signature: &[u8],
    algorithm: &str,
    public_key: &JsonWebKey,
) -> Result<(), VerifyFailure> {
    if let Some(key_alg) = &public_key.alg {
        if key_alg != algorithm {
            return Err(VerifyFailure::KeyDecoding(format!(
                "key is for {key_alg}, token uses {algorithm}"
            )));
        }
    }

    match algorithm {
        "RS256" => verify_rsa_signature(signing_input, signature, public_key),
        "ES256" => verify_ecdsa_signature(signing_input, signature, public_key),
        alg => Err(VerifyFailure::UnsupportedAlgorithm(alg.to_string())),
    }
}

fn verify_rsa_signature(
    signing_input: &str,
    signature: &[u8],
    public_key: &JsonWebKey,
) -> Result<(), VerifyFailure> {
    use rsa::signature::Verifier;

    if public_key.kty != "RSA" {
        return Err(VerifyFailure::KeyDecoding(format!(
            "expected RSA key, got {}",
            public_key.kty
        )));
    }

    let n_bytes = decode_b64_component(public_key.n.as_ref(), "modulus")?;
    let e_bytes = decode_b64_component(public_key.e.as_ref(), "exponent")?;

    let rsa_key = RsaPublicKey::new(
        rsa::BigUint::from_bytes_be(&n_bytes),
        rsa::BigUint::from_bytes_be(&e_bytes),
    )
    .map_err(|e| VerifyFailure::KeyDecoding(format!("invalid RSA key: {e}")))?;

    let signature = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|_| VerifyFailure::SignatureInvalid)?;

    VerifyingKey::<Sha256>::new(rsa_key)
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| VerifyFailure::SignatureInvalid)
}

fn verify_ecdsa_signature(
    signing_input: &str,
    signature: &[u8],
    public_key: &JsonWebKey,
) -> Result<(), VerifyFailure> {
    use p256::ecdsa::signature::Verifier;

    if public_key.kty != "EC" || public_key.crv.as_deref().is_some_and(|crv| crv != "P-256") {
        return Err(VerifyFailure::KeyDecoding(
            "expected EC P-256 key".to_string(),
        ));
    }

    let x_bytes = decode_b64_component(public_key.x.as_ref(), "x coordinate")?;
    let y_bytes = decode_b64_component(public_key.y.as_ref(), "y coordinate")?;

    // Uncompressed SEC1 point: 0x04 || x || y
    let mut point_bytes = Vec::with_capacity(1 + x_bytes.len() + y_bytes.len());
    point_bytes.push(0x04);
    point_bytes.extend_from_slice(&x_bytes);
    point_bytes.extend_from_slice(&y_bytes);

    let encoded_point = EncodedPoint::from_bytes(&point_bytes)
        .map_err(|e| VerifyFailure::KeyDecoding(format!("invalid EC point: {e}")))?;
    let verifying_key = EcdsaVerifyingKey::from_encoded_point(&encoded_point)
        .map_err(|e| VerifyFailure::KeyDecoding(format!("invalid ECDSA key: {e}")))?;

    // JWS carries the raw r || s form
    let signature =
        EcdsaSignature::from_slice(signature).map_err(|_| VerifyFailure::SignatureInvalid)?;

    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| VerifyFailure::SignatureInvalid)
}
