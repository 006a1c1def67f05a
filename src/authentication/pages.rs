// Login pages rendered by the fallback views

use std::fmt::Write as _;

use crate::models::FlashMessage;
use crate::oauth::ProviderLink;

/// Escape text for HTML element content and double-quoted attributes
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn render_flashes(flashes: &[FlashMessage]) -> String {
    let mut html = String::new();
    for flash in flashes {
        let _ = write!(
            html,
            r#"<div class="alert alert-{}">{}</div>"#,
            escape_html(&flash.category),
            escape_html(&flash.message)
        );
    }
    html
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<main class="login">
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#
    )
}

/// Username/password form posting back to `action`
#[must_use]
pub fn login_form(action: &str, flashes: &[FlashMessage], redirect: Option<&str>) -> String {
    let redirect_field = redirect.map_or_else(String::new, |target| {
        format!(
            r#"<input type="hidden" name="redirect" value="{}">"#,
            escape_html(target)
        )
    });

    let body = format!(
        r#"{flashes}
<form method="post" action="{action}">
{redirect_field}
<label>Username <input type="text" name="username" autocomplete="username" required></label>
<label>Password <input type="password" name="password" autocomplete="current-password" required></label>
<button type="submit">Sign in</button>
</form>"#,
        flashes = render_flashes(flashes),
        action = escape_html(action),
    );
    layout("Sign in", &body)
}

/// One link per provider; the login request's query string is carried to the handshake
#[must_use]
pub fn provider_picker(
    login_url: &str,
    providers: &[ProviderLink],
    flashes: &[FlashMessage],
    query_string: &str,
) -> String {
    let base = login_url.trim_end_matches('/');
    let suffix = if query_string.is_empty() {
        String::new()
    } else {
        format!("?{query_string}")
    };

    let mut links = String::new();
    for provider in providers {
        let _ = write!(
            links,
            r#"<li><a href="{}">Sign in with {}</a></li>"#,
            escape_html(&format!(
                "{base}/{}{suffix}",
                urlencoding::encode(&provider.name)
            )),
            escape_html(&provider.label)
        );
    }

    let body = format!("{}\n<ul class=\"providers\">{links}</ul>", render_flashes(flashes));
    layout("Sign in", &body)
}
