pub mod crypto;
pub mod logging;
pub mod redirect_validator;
pub mod responses;

pub use logging::LoggingHelper;
pub use redirect_validator::{is_safe_url, resolve_post_login_redirect, RedirectPolicy};
pub use responses::ResponseBuilder;
