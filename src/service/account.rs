//! Account service
//!
//! Local (username + password) signup and login, and session-backed
//! identity lookups.

use std::sync::Arc;

use crate::auth::{Session, SessionStore};
use crate::data::{Database, NewUser, User};
use crate::error::{AppError, is_unique_violation};
use crate::metrics::record_auth_event;

const DUPLICATE_USERNAME: &str = "Username already exists";
const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Account service
pub struct AccountService {
    db: Arc<Database>,
    sessions: Arc<SessionStore>,
}

impl AccountService {
    pub fn new(db: Arc<Database>, sessions: Arc<SessionStore>) -> Self {
        Self { db, sessions }
    }

    /// Create a local account and log it in
    ///
    /// The user row and the session binding are written in one
    /// transaction.
    ///
    /// # Errors
    /// - `Validation` if username or password is missing or empty
    /// - `Conflict` if the username is taken
    pub async fn signup(
        &self,
        session: &mut Session,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AppError> {
        let username = username.map(str::trim).unwrap_or_default();
        let password = password.unwrap_or_default();
        if username.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        // Fast path; the UNIQUE constraint below is what actually guarantees it.
        if self.db.get_user_by_username(username).await?.is_some() {
            record_auth_event("signup", "duplicate_username");
            return Err(AppError::Conflict(DUPLICATE_USERNAME.to_string()));
        }

        let mut new_user = NewUser::local(username);
        let password = password.to_string();
        let new_user = tokio::task::spawn_blocking(move || {
            new_user.set_password(&password)?;
            Ok::<_, AppError>(new_user)
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

        let pending = self.sessions.begin_login(session);
        let user = match self
            .db
            .insert_user_with_session(
                &new_user,
                pending.record(),
                pending.replaced_token_hash(),
            )
            .await
        {
            Ok(user) => user,
            Err(AppError::Database(error)) if is_unique_violation(&error) => {
                record_auth_event("signup", "duplicate_username");
                return Err(AppError::Conflict(DUPLICATE_USERNAME.to_string()));
            }
            Err(error) => return Err(error),
        };
        self.sessions.finish_login(session, pending, user.id);

        record_auth_event("signup", "success");
        tracing::info!(user_id = user.id, username = %user.username, "User signed up");
        Ok(user)
    }

    /// Check credentials and log the user in
    ///
    /// # Errors
    /// `Unauthorized` for an unknown user, a wrong password, or an OAuth-only
    /// account. The session is untouched on failure.
    pub async fn login(
        &self,
        session: &mut Session,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AppError> {
        let (Some(username), Some(password)) = (username, password) else {
            record_auth_event("login", "failure");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        let Some(user) = self.db.get_user_by_username(username.trim()).await? else {
            record_auth_event("login", "failure");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        };

        let password = password.to_string();
        let (user, authenticated) = tokio::task::spawn_blocking(move || {
            let authenticated = user.authenticate(&password);
            (user, authenticated)
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

        if !authenticated {
            record_auth_event("login", "failure");
            tracing::debug!(user_id = user.id, "Rejected login attempt");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }

        self.sessions.login(session, user.id).await?;
        record_auth_event("login", "success");
        tracing::info!(user_id = user.id, "User logged in");
        Ok(user)
    }

    /// The user bound to the session
    ///
    /// # Errors
    /// `Unauthorized` if the session has no user or the user row is gone
    pub async fn current_user(&self, session: &Session) -> Result<User, AppError> {
        let user_id = session
            .current_user_id()
            .ok_or_else(|| AppError::unauthorized("User not signed in"))?;

        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("User not signed in"))
    }

    pub async fn logout(&self, session: &mut Session) -> Result<(), AppError> {
        let user_id = session.current_user_id();
        self.sessions.logout(session).await?;
        record_auth_event("logout", "success");
        tracing::info!(user_id, "User logged out");
        Ok(())
    }
}
