#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the reportgate application
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod authentication;
pub mod fiscal;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod oauth;
pub mod session;
pub mod settings;
pub mod users;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use authentication::{LoginView, LoginViewFactory, SessionBridge};
pub use handlers::AppState;
pub use identity::{IdentityPlatformVerifier, SessionCookieVerifier, VerifyResult};
pub use session::SessionManager;
pub use settings::ReportgateSettings;
