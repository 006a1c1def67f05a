//! Login and logout
//!
//! Both login variants (database form and OAuth provider) sit behind the
//! session bridge: the external session cookie is tried first and the
//! variant's own view only runs when it does not authenticate the request.

pub mod bridge;
pub mod bridged;
pub mod database;
pub mod factory;
pub mod logout;
pub mod oauth;
pub mod pages;
pub mod traits;

pub use bridge::{BridgeOutcome, SessionBridge, REDIRECT_PARAM};
pub use bridged::BridgedLoginView;
pub use database::DatabaseLoginView;
pub use factory::{LoginServices, LoginViewFactory, LoginViews};
pub use logout::LogoutHook;
pub use oauth::{CallbackError, OAuthLoginView};
pub use traits::{LoginForm, LoginRequest, LoginView, LogoutError};
