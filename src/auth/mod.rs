//! Authentication
//!
//! Handles:
//! - Local username/password accounts
//! - GitHub OAuth sign-in and account linking
//! - Session management
//! - Authentication middleware

mod github;
mod local;
mod middleware;
mod oauth;
pub(crate) mod password;
pub mod session;

pub use github::{GitHubClient, IdentityProvider, ProviderProfile};
pub use middleware::{CurrentSession, CurrentUser, require_auth};
pub use oauth::auth_router;
pub use session::{PendingLogin, SESSION_COOKIE, Session, SessionStore};

#[cfg(test)]
pub use github::MockIdentityProvider;
