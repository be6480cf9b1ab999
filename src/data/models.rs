//! Data models
//!
//! Rust structs representing database rows. IDs are SQLite integer
//! primary keys and timestamps use chrono.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::auth::password::{hash_password, verify_password};
use crate::error::AppError;

// =============================================================================
// User
// =============================================================================

/// Identity record
///
/// The password hash is write-only: it can be set through
/// [`User::set_password`] and checked through [`User::authenticate`], but it
/// is never readable outside the data layer and never printed by `Debug`.
#[derive(Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub(in crate::data) password_hash: Option<String>,
    pub github_id: Option<String>,
    pub avatar_url: Option<String>,
    /// Set at creation, immutable afterwards
    pub is_oauth_user: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Hash and store a new password. Empty input leaves the hash untouched.
    pub fn set_password(&mut self, plaintext: &str) -> Result<(), AppError> {
        if let Some(hash) = hash_non_empty(plaintext)? {
            self.password_hash = Some(hash);
        }
        Ok(())
    }

    /// Check a plaintext password against the stored hash.
    ///
    /// Always false for OAuth users and for accounts without a hash, so an
    /// OAuth-only account cannot be reached through the local login path.
    pub fn authenticate(&self, plaintext: &str) -> bool {
        if self.is_oauth_user {
            return false;
        }
        let Some(hash) = self.password_hash.as_deref() else {
            return false;
        };

        match verify_password(plaintext, hash) {
            Ok(matches) => matches,
            Err(error) => {
                tracing::warn!(user_id = self.id, %error, "Stored password hash is malformed");
                false
            }
        }
    }

    pub fn has_github_linked(&self) -> bool {
        self.github_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "[redacted]"))
            .field("github_id", &self.github_id)
            .field("avatar_url", &self.avatar_url)
            .field("is_oauth_user", &self.is_oauth_user)
            .finish()
    }
}

/// A user row that has not been inserted yet
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub(in crate::data) password_hash: Option<String>,
    pub github_id: Option<String>,
    pub avatar_url: Option<String>,
    pub is_oauth_user: bool,
}

impl NewUser {
    /// Local (password) account
    pub fn local(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: None,
            password_hash: None,
            github_id: None,
            avatar_url: None,
            is_oauth_user: false,
        }
    }

    /// Account created from a GitHub profile. Never carries a password.
    pub fn oauth(
        username: impl Into<String>,
        email: Option<String>,
        github_id: impl Into<String>,
        avatar_url: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email,
            password_hash: None,
            github_id: Some(github_id.into()),
            avatar_url,
            is_oauth_user: true,
        }
    }

    pub fn set_password(&mut self, plaintext: &str) -> Result<(), AppError> {
        if let Some(hash) = hash_non_empty(plaintext)? {
            self.password_hash = Some(hash);
        }
        Ok(())
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "[redacted]"))
            .field("github_id", &self.github_id)
            .field("avatar_url", &self.avatar_url)
            .field("is_oauth_user", &self.is_oauth_user)
            .finish()
    }
}

fn hash_non_empty(plaintext: &str) -> Result<Option<String>, AppError> {
    if plaintext.is_empty() {
        return Ok(None);
    }
    Ok(Some(hash_password(plaintext)?))
}

// =============================================================================
// Session
// =============================================================================

/// Server-side session row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    /// SHA-256 of the cookie token
    pub token_hash: String,
    /// None once logged out
    pub user_id: Option<i64>,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

// =============================================================================
// Cafes, coffees and notes
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Cafe {
    pub id: i64,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Coffee {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub cafe_id: i64,
}

/// A user's rating and comment on a coffee
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub rating: i64,
    pub comment: String,
    pub user_id: i64,
    pub coffee_id: i64,
}
