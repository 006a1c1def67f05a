//! Local user directory
//!
//! The gateway never creates accounts. It resolves verified identities to the
//! records loaded here, by email (case-insensitive) or by username.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// A persisted account owned by the BI application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: u64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Argon2 PHC string, absent for accounts that only sign in through SSO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to read user directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse user directory: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate email in user directory: {0}")]
    DuplicateEmail(String),
    #[error("duplicate username in user directory: {0}")]
    DuplicateUsername(String),
}

/// Lookup capability over the local user store
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find the active user whose email matches, ignoring case and surrounding whitespace
    async fn find_user(&self, email: &str) -> Result<Option<LocalUser>, DirectoryError>;

    async fn find_user_by_username(&self, username: &str)
        -> Result<Option<LocalUser>, DirectoryError>;
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Directory held in memory, loaded once at startup
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: Vec<LocalUser>,
    by_email: HashMap<String, usize>,
    by_username: HashMap<String, usize>,
}

impl InMemoryUserDirectory {
    /// Build a directory from records
    ///
    /// # Errors
    ///
    /// Returns an error if two records share an email or a username
    pub fn new(users: Vec<LocalUser>) -> Result<Self, DirectoryError> {
        let mut by_email = HashMap::with_capacity(users.len());
        let mut by_username = HashMap::with_capacity(users.len());

        for (index, user) in users.iter().enumerate() {
            let email = normalize_email(&user.email);
            if by_email.insert(email.clone(), index).is_some() {
                return Err(DirectoryError::DuplicateEmail(email));
            }
            if by_username.insert(user.username.clone(), index).is_some() {
                return Err(DirectoryError::DuplicateUsername(user.username.clone()));
            }
        }

        Ok(Self {
            users,
            by_email,
            by_username,
        })
    }

    /// Load a JSON array of [`LocalUser`] records
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or contains duplicates
    pub fn from_json_file(path: &Path) -> Result<Self, DirectoryError> {
        let content = std::fs::read_to_string(path)?;
        let users: Vec<LocalUser> = serde_json::from_str(&content)?;
        log::info!("Loaded {} local users from {}", users.len(), path.display());
        Self::new(users)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn active(&self, index: Option<&usize>) -> Option<LocalUser> {
        index
            .and_then(|&index| self.users.get(index))
            .filter(|user| user.active)
            .cloned()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user(&self, email: &str) -> Result<Option<LocalUser>, DirectoryError> {
        Ok(self.active(self.by_email.get(&normalize_email(email))))
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<LocalUser>, DirectoryError> {
        Ok(self.active(self.by_username.get(username.trim())))
    }
}

/// Hash a password into an Argon2 PHC string
///
/// # Errors
///
/// Returns an error if hashing fails
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Check a password against an Argon2 PHC string; malformed hashes never verify
#[must_use]
pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}
