//! HTTP response construction
//!
//! Every login and logout branch ends in one of these responses, so the
//! builders here never fail.

use actix_web::http::header::{self, HeaderValue};
use actix_web::{cookie::Cookie, http::StatusCode, HttpResponse};
use serde_json::json;

/// Unified response builder for redirects, HTML pages and JSON errors
pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Create a redirect response (302 Found) with optional cookies
    #[must_use]
    pub fn redirect(location: &str) -> RedirectBuilder {
        RedirectBuilder::new(location)
    }

    /// Render a complete HTML document
    #[must_use]
    pub fn html(body: String) -> HttpResponse {
        HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, "text/html; charset=utf-8"))
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .body(body)
    }

    /// Create an `Unauthorized` (401) error response
    #[must_use]
    pub fn unauthorized() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Authentication is required to access this resource",
        )
    }

    /// Create a `NotFound` (404) error response
    #[must_use]
    pub fn not_found() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(
            StatusCode::NOT_FOUND,
            "not_found",
            "The requested resource is not available",
        )
    }
}

/// Builder for redirect responses
pub struct RedirectBuilder {
    location: String,
    cookies: Vec<Cookie<'static>>,
}

impl RedirectBuilder {
    fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: impl IntoIterator<Item = Cookie<'static>>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Finish the redirect; a location that is not a valid header value becomes `/`
    #[must_use]
    pub fn build(self) -> HttpResponse {
        let location = HeaderValue::from_str(&self.location).unwrap_or_else(|_| {
            log::warn!("Redirect location is not a valid header value, using /");
            HeaderValue::from_static("/")
        });

        let mut builder = HttpResponse::Found();
        for cookie in self.cookies {
            builder.cookie(cookie);
        }
        builder.insert_header((header::LOCATION, location)).finish()
    }
}

/// Builder for JSON error responses
pub struct ErrorResponseBuilder {
    status: StatusCode,
    error_code: &'static str,
    message: String,
}

impl ErrorResponseBuilder {
    fn new(status: StatusCode, error_code: &'static str, message: &str) -> Self {
        Self {
            status,
            error_code,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn with_error_code(mut self, code: &'static str) -> Self {
        self.error_code = code;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_string();
        self
    }

    #[must_use]
    pub fn build(self) -> HttpResponse {
        HttpResponse::build(self.status).json(json!({
            "error": self.error_code,
            "error_description": self.message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;

    #[test]
    fn test_redirect_carries_location_and_cookies() {
        let response = ResponseBuilder::redirect("/superset/welcome/")
            .with_cookie(Cookie::new("a", "1"))
            .with_cookies(vec![Cookie::new("b", "2")])
            .build();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/superset/welcome/"
        );
        assert_eq!(response.cookies().count(), 2);
    }

    #[test]
    fn test_unencodable_location_still_redirects() {
        let response = ResponseBuilder::redirect("/dashboard\r\n5")
            .with_cookie(Cookie::new("a", "1"))
            .build();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
        assert_eq!(response.cookies().count(), 1);
    }

    #[test]
    fn test_error_builder_status() {
        let response = ResponseBuilder::not_found()
            .with_error_code("fiscal_year_unavailable")
            .build();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ResponseBuilder::unauthorized().with_message("No session").build();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_html_is_not_cached() {
        let response = ResponseBuilder::html("<p>hi</p>".to_string());
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );
    }
}
