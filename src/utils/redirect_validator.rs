//! Post-login redirect safety
//!
//! A redirect target is resolved against the URL the request arrived on and
//! accepted only when it stays on `http`/`https` and its network location
//! matches the current host's. The default [`RedirectPolicy::Suffix`] accepts
//! any network location that ends with the current one, so subdomains of the
//! serving host pass. [`RedirectPolicy::Exact`] accepts only the current host.

use actix_web::HttpRequest;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use url::Url;

const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedirectPolicy {
    /// Network location must end with the current host's network location.
    /// Note that this also admits `evilapp.example` for host `app.example`.
    #[default]
    Suffix,
    /// Network location must equal the current host's network location
    Exact,
}

/// Check whether `target` is a safe post-login destination for a request served at `host_url`
#[must_use]
pub fn is_safe_url(target: &str, host_url: &Url, policy: RedirectPolicy) -> bool {
    // URL parsing drops tab, CR and LF, so they are checked on the raw target
    if target.chars().any(char::is_control) {
        debug!("Redirect target contains control characters");
        return false;
    }

    let Ok(resolved) = host_url.join(target) else {
        debug!("Redirect target '{target}' could not be resolved");
        return false;
    };

    if !ALLOWED_SCHEMES.contains(&resolved.scheme()) {
        return false;
    }

    let candidate = netloc(&resolved);
    let reference = netloc(host_url);
    if candidate.is_empty() || reference.is_empty() {
        return false;
    }

    match policy {
        RedirectPolicy::Suffix => candidate.ends_with(&reference),
        RedirectPolicy::Exact => candidate == reference,
    }
}

/// Pick the post-login location: the requested target when it is safe, otherwise `default`
#[must_use]
pub fn resolve_post_login_redirect(
    requested: Option<&str>,
    host_url: &Url,
    policy: RedirectPolicy,
    default: &str,
) -> String {
    match requested.map(str::trim).filter(|target| !target.is_empty()) {
        Some(target) if is_safe_url(target, host_url, policy) => target.to_string(),
        Some(target) => {
            warn!("Discarding unsafe redirect target: {target}");
            default.to_string()
        }
        None => default.to_string(),
    }
}

/// The URL the current request was served on, honouring forwarding headers
#[must_use]
pub fn request_host_url(req: &HttpRequest) -> Option<Url> {
    let info = req.connection_info();
    Url::parse(&format!("{}://{}/", info.scheme(), info.host())).ok()
}

/// `userinfo@host:port` as it appears in the URL authority
fn netloc(url: &Url) -> String {
    let mut netloc = String::new();
    if !url.username().is_empty() {
        netloc.push_str(url.username());
        if let Some(password) = url.password() {
            netloc.push(':');
            netloc.push_str(password);
        }
        netloc.push('@');
    }
    if let Some(host) = url.host_str() {
        netloc.push_str(host);
    }
    if let Some(port) = url.port() {
        netloc.push(':');
        netloc.push_str(&port.to_string());
    }
    netloc
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn host() -> Url {
        Url::parse("https://app.example/").unwrap()
    }

    #[test]
    fn test_rejects_foreign_host() {
        assert!(!is_safe_url("https://evil.example/x", &host(), RedirectPolicy::Suffix));
    }

    #[test]
    fn test_accepts_subdomain_under_suffix_policy() {
        assert!(is_safe_url("https://sub.app.example/x", &host(), RedirectPolicy::Suffix));
    }

    #[test]
    fn test_accepts_relative_path() {
        assert!(is_safe_url("/relative/path", &host(), RedirectPolicy::Suffix));
        assert!(is_safe_url("/relative/path", &host(), RedirectPolicy::Exact));
        assert!(is_safe_url("dashboard/5", &host(), RedirectPolicy::Suffix));
    }

    #[test]
    fn test_rejects_control_characters() {
        assert!(!is_safe_url("/dashboard\r\n5", &host(), RedirectPolicy::Suffix));
        assert!(!is_safe_url("/dash\tboard", &host(), RedirectPolicy::Exact));
        assert_eq!(
            resolve_post_login_redirect(
                Some("/dashboard\r\nSet-Cookie: x=1"),
                &host(),
                RedirectPolicy::Suffix,
                "/superset/welcome/",
            ),
            "/superset/welcome/"
        );
    }

    #[test]
    fn test_rejects_script_scheme() {
        assert!(!is_safe_url("javascript:alert(1)", &host(), RedirectPolicy::Suffix));
        assert!(!is_safe_url("data:text/html,hi", &host(), RedirectPolicy::Suffix));
    }

    #[test]
    fn test_rejects_scheme_relative_foreign_host() {
        assert!(!is_safe_url("//evil.example/x", &host(), RedirectPolicy::Suffix));
    }

    #[test]
    fn test_suffix_policy_admits_sibling_sharing_suffix() {
        // Plain string suffix matching: a different registrable name that happens
        // to end with the serving host is accepted
        assert!(is_safe_url("https://evilapp.example/x", &host(), RedirectPolicy::Suffix));
        assert!(!is_safe_url("https://evilapp.example/x", &host(), RedirectPolicy::Exact));
    }

    #[test]
    fn test_suffix_policy_does_not_admit_parent_domain() {
        let host = Url::parse("https://reports.insentric.net/").unwrap();
        assert!(!is_safe_url("https://insentric.net/", &host, RedirectPolicy::Suffix));
        assert!(!is_safe_url("https://admin.insentric.net/", &host, RedirectPolicy::Suffix));
    }

    #[test]
    fn test_exact_policy_rejects_subdomain() {
        assert!(!is_safe_url("https://sub.app.example/x", &host(), RedirectPolicy::Exact));
        assert!(is_safe_url("https://app.example/x", &host(), RedirectPolicy::Exact));
    }

    #[test]
    fn test_scheme_change_is_allowed() {
        assert!(is_safe_url("http://app.example/x", &host(), RedirectPolicy::Exact));
    }

    #[test]
    fn test_port_is_part_of_netloc() {
        let host = Url::parse("http://localhost:8088/").unwrap();
        assert!(is_safe_url("http://localhost:8088/x", &host, RedirectPolicy::Exact));
        assert!(!is_safe_url("http://localhost:9999/x", &host, RedirectPolicy::Exact));
    }

    #[test]
    fn test_userinfo_is_part_of_netloc() {
        // The browser would go to app.example, and the authority still ends with it
        assert!(is_safe_url("https://evil.example@app.example/", &host(), RedirectPolicy::Suffix));
        // Here the browser would go to evil.example
        assert!(!is_safe_url("https://app.example@evil.example/", &host(), RedirectPolicy::Suffix));
    }

    #[test]
    fn test_resolve_post_login_redirect() {
        let index = "/superset/welcome/";
        assert_eq!(
            resolve_post_login_redirect(Some("/dashboard/5"), &host(), RedirectPolicy::Suffix, index),
            "/dashboard/5"
        );
        assert_eq!(
            resolve_post_login_redirect(
                Some("https://attacker.test"),
                &host(),
                RedirectPolicy::Suffix,
                index
            ),
            index
        );
        assert_eq!(
            resolve_post_login_redirect(Some("  "), &host(), RedirectPolicy::Suffix, index),
            index
        );
        assert_eq!(
            resolve_post_login_redirect(None, &host(), RedirectPolicy::Suffix, index),
            index
        );
    }

    #[test]
    fn test_request_host_url_uses_host_header() {
        let req = TestRequest::default()
            .insert_header(("Host", "reports.insentric.net"))
            .to_http_request();
        let url = request_host_url(&req).unwrap();
        assert_eq!(url.host_str(), Some("reports.insentric.net"));
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_request_host_url_honours_forwarded_proto() {
        let req = TestRequest::default()
            .insert_header(("Host", "reports.insentric.net"))
            .insert_header(("X-Forwarded-Proto", "https"))
            .to_http_request();
        let url = request_host_url(&req).unwrap();
        assert_eq!(url.scheme(), "https");
    }
}
