//! Linking a GitHub identity to an existing account

use std::sync::Arc;

use serde::Serialize;

use crate::data::{Database, User};
use crate::error::{AppError, is_unique_violation};
use crate::metrics::record_auth_event;

const ALREADY_LINKED: &str = "GitHub account already linked to another user";
const OAUTH_IDENTITY_FIXED: &str = "GitHub sign-in accounts cannot be linked to a different GitHub account";

/// Derived OAuth facts about a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub is_oauth_user: bool,
    pub has_github_linked: bool,
    pub avatar_url: Option<String>,
}

impl From<&User> for LinkStatus {
    fn from(user: &User) -> Self {
        Self {
            is_oauth_user: user.is_oauth_user,
            has_github_linked: user.has_github_linked(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// Account linking service
pub struct LinkingService {
    db: Arc<Database>,
}

impl LinkingService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The logged-in user id, or the 401 every linking request gets without one
    pub fn require_login(current_user_id: Option<i64>) -> Result<i64, AppError> {
        current_user_id.ok_or_else(|| AppError::unauthorized("Must be logged in to link accounts"))
    }

    /// Attach `github_id` (and avatar) to the current user
    ///
    /// Linking the id the user already carries is accepted and refreshes the
    /// avatar. `is_oauth_user` is never changed. An account created through
    /// GitHub sign-in has no password, so it may only relink its own id.
    ///
    /// # Errors
    /// - `Unauthorized` without a logged-in user
    /// - `Validation` if `github_id` is missing, or differs from the id of a
    ///   GitHub sign-in account
    /// - `Conflict` if another user already carries `github_id`
    /// - `NotFound` if the current user row is gone
    pub async fn link(
        &self,
        current_user_id: Option<i64>,
        github_id: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User, AppError> {
        let user_id = Self::require_login(current_user_id)?;
        let github_id = github_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Validation("GitHub ID required".to_string()))?;

        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        if user.is_oauth_user && user.github_id.as_deref() != Some(github_id.as_str()) {
            record_auth_event("link", "rejected");
            return Err(AppError::Validation(OAUTH_IDENTITY_FIXED.to_string()));
        }

        if let Some(owner) = self.db.get_user_by_github_id(&github_id).await? {
            if owner.id != user_id {
                record_auth_event("link", "conflict");
                return Err(AppError::Conflict(ALREADY_LINKED.to_string()));
            }
        }

        match self
            .db
            .link_github(user_id, &github_id, avatar_url.as_deref())
            .await
        {
            Ok(true) => {}
            Ok(false) => return Err(AppError::not_found("User not found")),
            Err(AppError::Database(error)) if is_unique_violation(&error) => {
                record_auth_event("link", "conflict");
                return Err(AppError::Conflict(ALREADY_LINKED.to_string()));
            }
            Err(error) => return Err(error),
        }

        record_auth_event("link", "success");
        tracing::info!(user_id, github_id = %github_id, "GitHub account linked");

        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Report OAuth facts about the current user without changing anything
    pub async fn status(&self, current_user_id: Option<i64>) -> Result<LinkStatus, AppError> {
        let user_id = current_user_id.ok_or_else(|| AppError::unauthorized("Not logged in"))?;
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        Ok(LinkStatus::from(&user))
    }
}
