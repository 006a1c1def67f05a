//! Local session handling
//!
//! - [`manager`] - encrypted local sessions, flash messages and OAuth handshake state
//! - [`cookie`] - cookie construction, including deletion of the external session cookie
//! - [`refresh`] - sliding session expiry middleware

pub mod cookie;
pub mod manager;
pub mod refresh;

pub use cookie::{
    external_cookie_removal, CookieFactory, CookieOptions, FLASH_COOKIE, OAUTH_STATE_COOKIE,
};
pub use manager::SessionManager;
pub use refresh::refresh_session;
