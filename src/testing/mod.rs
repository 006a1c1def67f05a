//! Shared test utilities
//!
//! Compiled for unit tests and, with the `testing` feature, for the
//! integration tests under `tests/`.
//!
//! - [`fixtures`] - settings, users and a signer for identity platform session cookies
//! - [`mock`] - scripted verifier, login view and OAuth provider client

pub mod fixtures;
pub mod mock;

pub use fixtures::{SessionCookieSigner, TestFixtures};
pub use mock::{MockLoginView, MockOAuthClient, MockVerifier};

/// Common test constants
pub mod constants {
    /// Key the local session cookies are encrypted with in tests
    pub const TEST_SESSION_SECRET: &str = "reportgate-test-session-secret-32b";

    /// Password of every fixture user that has one
    pub const TEST_PASSWORD: &str = "correct horse battery staple";

    /// Identity platform project the fixture session cookies are minted for
    pub const TEST_PROJECT_ID: &str = "reportgate-test";

    /// `kid` of the fixture signing key
    pub const TEST_KEY_ID: &str = "test-key-1";

    pub const TEST_EMAIL: &str = "a@x.com";
}
