// Verifier, revocation check and fiscal year read against a local stand-in
// for the identity platform and document store
use std::net::SocketAddr;

use actix_web::{web, App, HttpResponse, HttpServer};
use serde_json::{json, Value};
use serial_test::serial;

use reportgate::fiscal::{fetch_fiscal_year, FiscalError};
use reportgate::identity::{
    AccountLookupRevocationChecker, IdentityPlatformVerifier, RevocationChecker, SessionClaims,
    VerifyFailure,
};
use reportgate::settings::{FiscalSettings, IdentitySettings};
use reportgate::testing::fixtures::{SessionCookieSigner, TestFixtures};
use reportgate::VerifyResult;

const TOKEN_ENV: &str = "REPORTGATE_TEST_UPSTREAM_TOKEN";

async fn jwks() -> HttpResponse {
    HttpResponse::Ok().json(SessionCookieSigner::jwks())
}

async fn lookup(body: web::Json<Value>) -> HttpResponse {
    let local_id = body["localId"][0].as_str().unwrap_or_default().to_string();
    let record = match local_id.as_str() {
        "uid-revoked@x.com" => json!({ "localId": local_id, "validSince": "99999999999" }),
        "uid-disabled@x.com" => json!({ "localId": local_id, "disabled": true }),
        "uid-gone@x.com" => return HttpResponse::Ok().json(json!({})),
        _ => json!({ "localId": local_id, "validSince": "0" }),
    };
    HttpResponse::Ok().json(json!({ "users": [record] }))
}

async fn documents() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "documents": [{
            "name": "projects/p/databases/(default)/documents/accounts/acme",
            "fields": {
                "fiscal_year": { "mapValue": { "fields": {
                    "custom": { "booleanValue": true },
                    "start_month": { "integerValue": "7" }
                }}}
            }
        }]
    }))
}

async fn unavailable() -> HttpResponse {
    HttpResponse::ServiceUnavailable().finish()
}

/// Serve the stand-in endpoints on an ephemeral port
fn start_upstream() -> SocketAddr {
    let server = HttpServer::new(|| {
        App::new()
            .route("/jwks", web::get().to(jwks))
            .route("/lookup", web::post().to(lookup))
            .route("/documents", web::get().to(documents))
            .route("/broken", web::get().to(unavailable))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    addr
}

fn identity_settings(addr: SocketAddr, check_revoked: bool) -> IdentitySettings {
    IdentitySettings {
        jwks_uri: format!("http://{addr}/jwks"),
        lookup_endpoint: format!("http://{addr}/lookup"),
        access_token_env: TOKEN_ENV.to_string(),
        check_revoked,
        ..TestFixtures::settings().identity
    }
}

fn claims(email: &str) -> SessionClaims {
    let signer = SessionCookieSigner::new();
    serde_json::from_value(signer.claims_for(email)).unwrap()
}

#[actix_web::test]
async fn test_verifier_fetches_signing_keys() {
    let addr = start_upstream();
    let verifier = IdentityPlatformVerifier::from_settings(&identity_settings(addr, false)).unwrap();

    let signer = SessionCookieSigner::new();
    let claims = verifier
        .verify_token(&signer.sign(&signer.claims_for("a@x.com")))
        .await
        .unwrap();
    assert_eq!(claims.email.as_deref(), Some("a@x.com"));
}

#[actix_web::test]
async fn test_unknown_key_id_is_rejected_after_refresh() {
    let addr = start_upstream();
    let verifier = IdentityPlatformVerifier::from_settings(&identity_settings(addr, false)).unwrap();

    let signer = SessionCookieSigner::new().with_key_id("rotated-away");
    let result = verifier
        .verify_token(&signer.sign(&signer.claims_for("a@x.com")))
        .await;
    assert_eq!(
        result,
        Err(VerifyFailure::KeyNotFound("rotated-away".to_string()))
    );
}

#[actix_web::test]
async fn test_unreachable_key_endpoint_is_a_key_fetch_failure() {
    let mut settings = TestFixtures::settings().identity;
    settings.jwks_uri = "http://127.0.0.1:9/jwks".to_string();
    let verifier = IdentityPlatformVerifier::from_settings(&settings).unwrap();

    let signer = SessionCookieSigner::new();
    let result = verifier
        .verify_token(&signer.sign(&signer.claims_for("a@x.com")))
        .await;
    assert!(matches!(result, Err(VerifyFailure::KeyFetch(_))));
}

#[actix_web::test]
#[serial]
async fn test_revocation_check_outcomes() {
    let addr = start_upstream();
    std::env::set_var(TOKEN_ENV, "lookup-token");
    let checker = AccountLookupRevocationChecker::new(
        format!("http://{addr}/lookup"),
        TOKEN_ENV.to_string(),
        reqwest::Client::new(),
    );

    assert_eq!(checker.check(&claims("a@x.com")).await, Ok(()));
    assert_eq!(
        checker.check(&claims("revoked@x.com")).await,
        Err(VerifyFailure::Revoked)
    );
    assert_eq!(
        checker.check(&claims("disabled@x.com")).await,
        Err(VerifyFailure::AccountDisabled)
    );
    assert_eq!(
        checker.check(&claims("gone@x.com")).await,
        Err(VerifyFailure::AccountNotFound)
    );

    std::env::remove_var(TOKEN_ENV);
}

#[actix_web::test]
#[serial]
async fn test_revocation_check_without_credentials_fails_closed() {
    let addr = start_upstream();
    std::env::remove_var(TOKEN_ENV);
    let checker = AccountLookupRevocationChecker::new(
        format!("http://{addr}/lookup"),
        TOKEN_ENV.to_string(),
        reqwest::Client::new(),
    );

    assert!(matches!(
        checker.check(&claims("a@x.com")).await,
        Err(VerifyFailure::RevocationCheck(_))
    ));
}

#[actix_web::test]
#[serial]
async fn test_verifier_applies_revocation_check() {
    use reportgate::SessionCookieVerifier;

    let addr = start_upstream();
    std::env::set_var(TOKEN_ENV, "lookup-token");
    let verifier = IdentityPlatformVerifier::from_settings(&identity_settings(addr, true)).unwrap();
    let signer = SessionCookieSigner::new();

    let accepted = verifier
        .verify(&signer.sign(&signer.claims_for("a@x.com")))
        .await;
    assert!(matches!(accepted, VerifyResult::Verified(_)));

    let revoked = verifier
        .verify(&signer.sign(&signer.claims_for("revoked@x.com")))
        .await;
    assert_eq!(revoked, VerifyResult::Failed(VerifyFailure::Revoked));

    std::env::remove_var(TOKEN_ENV);
}

#[actix_web::test]
#[serial]
async fn test_fiscal_year_read() {
    let addr = start_upstream();
    std::env::set_var(TOKEN_ENV, "documents-token");
    let settings = FiscalSettings {
        enabled: true,
        documents_url: format!("http://{addr}/documents"),
        access_token_env: TOKEN_ENV.to_string(),
    };

    let fiscal_year = fetch_fiscal_year(&reqwest::Client::new(), &settings)
        .await
        .unwrap();
    assert_eq!(fiscal_year.start_month, 7);
    assert_eq!(fiscal_year.offset, 6);

    std::env::remove_var(TOKEN_ENV);
}

#[actix_web::test]
async fn test_fiscal_year_read_reports_upstream_error() {
    let addr = start_upstream();
    let settings = FiscalSettings {
        enabled: true,
        documents_url: format!("http://{addr}/broken"),
        access_token_env: TOKEN_ENV.to_string(),
    };

    let result = fetch_fiscal_year(&reqwest::Client::new(), &settings).await;
    assert!(matches!(result, Err(FiscalError::Fetch(_))));
}
