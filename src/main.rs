#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{
    middleware::{from_fn, Logger},
    App, HttpServer,
};
use reportgate::{
    authentication::{LoginServices, LoginViewFactory},
    fiscal::fetch_fiscal_year,
    handlers::{AppState, FiscalYearState},
    identity::IdentityPlatformVerifier,
    oauth::{HttpOAuthClient, OAuthProviderClient},
    session::{refresh_session, SessionManager},
    settings::{AuthType, ReportgateSettings},
    users::{InMemoryUserDirectory, UserDirectory},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = ReportgateSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let state = build_state(settings)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to initialize gateway: {e:#}")))?;

    start_server(state).await
}

/// Construct every long-lived collaborator once, before the server starts
async fn build_state(settings: ReportgateSettings) -> anyhow::Result<AppState> {
    let verifier = IdentityPlatformVerifier::from_settings(&settings.identity)?;
    if let Err(e) = verifier.refresh_keys().await {
        log::warn!("Session cookie signing keys not loaded yet: {e}");
    }

    let directory: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::from_json_file(
        Path::new(&settings.users.directory_path),
    )?);

    let oauth_client: Option<Arc<dyn OAuthProviderClient>> =
        if settings.auth.auth_type == AuthType::Oauth {
            Some(Arc::new(HttpOAuthClient::from_settings(&settings)?))
        } else {
            None
        };

    let sessions = SessionManager::from_settings(&settings.session);
    let views = LoginViewFactory::create(
        &settings,
        LoginServices {
            verifier: Arc::new(verifier),
            directory: Arc::clone(&directory),
            sessions: sessions.clone(),
            oauth_client,
        },
    )?;

    let fiscal_year = if settings.fiscal.enabled {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                settings.identity.request_timeout_seconds,
            ))
            .build()?;
        Some(fetch_fiscal_year(&http, &settings.fiscal).await?)
    } else {
        None
    };

    Ok(AppState {
        settings,
        sessions,
        directory,
        views,
        fiscal_year: FiscalYearState(fiscal_year),
    })
}

/// Start the server with stateless sessions
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(state: AppState) -> std::io::Result<()> {
    let bind_address = state.settings.get_bind_address();
    print_startup_info(&bind_address, &state.settings);

    let cors_origins = state.settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Content-Type", "Accept"])
            .supports_credentials()
            .max_age(3600);

        let state = state.clone();
        App::new()
            .wrap(from_fn(refresh_session))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(move |cfg| state.configure(cfg))
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &ReportgateSettings) {
    println!("Starting reportgate on http://{bind_address}");
    println!(
        "Login variant: {}",
        match settings.auth.auth_type {
            AuthType::Db => "database",
            AuthType::Oauth => "oauth",
        }
    );
    println!(
        "Session bridge cookie: {} (identity project {})",
        settings.external_cookie.name, settings.identity.project_id
    );
    println!();
    println!("Login endpoints:");
    println!("  GET|POST /login/                    - Bridged login");
    if settings.auth.auth_type == AuthType::Oauth {
        println!("  GET  /login/{{provider}}              - Provider authorization");
        println!("  GET  /oauth-authorized/{{provider}}   - Provider callback");
        println!();
        println!("OAuth callback URLs for identity providers:");
        for provider in settings.get_enabled_providers() {
            println!(
                "  {}/oauth-authorized/{}",
                settings.application.base_url.trim_end_matches('/'),
                provider.name
            );
        }
    }
    println!("  GET|POST /logout/                   - Logout");
    println!();
    println!("System endpoints:");
    println!("  GET  /api/me          - Current user");
    println!("  GET  /api/fiscal-year - Fiscal year configuration");
    println!("  GET  /ping            - Health check");
}
