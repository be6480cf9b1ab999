//! GitHub sign-in
//!
//! Turns an authorization code into a logged-in local user. The decision of
//! what to do with a provider profile is kept separate ([`resolve`]) from
//! acting on it ([`IdentityService::complete_login`]):
//!
//! | provider id known | login taken by | result |
//! |---|---|---|
//! | yes | - | log in existing user |
//! | no | local user | `UsernameConflict`, nothing written |
//! | no | OAuth user | `OAuthUsernameMismatch`, nothing written |
//! | no | nobody | create OAuth user and log in |

use std::sync::Arc;

use crate::auth::{IdentityProvider, ProviderProfile, Session, SessionStore};
use crate::data::{Database, NewUser, User};
use crate::error::AppError;
use crate::metrics::record_auth_event;

/// What a provider profile maps to locally
#[derive(Debug)]
pub enum Resolution {
    /// A user already carries this provider id
    Existing(User),
    /// The login is the username of a local (password) account
    UsernameConflict(User),
    /// The login belongs to an OAuth user with a different provider id.
    /// Unreachable while provider ids and usernames stay consistent.
    OAuthUsernameMismatch(User),
    /// Nobody matches; this user should be created
    Create(NewUser),
}

/// Outcome of a completed GitHub sign-in
#[derive(Debug)]
pub enum GitHubLoginOutcome {
    Existing(User),
    Created(User),
    UsernameConflict,
}

/// Decide how a provider profile maps onto local users. Read-only.
pub async fn resolve(db: &Database, profile: &ProviderProfile) -> Result<Resolution, AppError> {
    if let Some(user) = db.get_user_by_github_id(&profile.external_id).await? {
        return Ok(Resolution::Existing(user));
    }

    if let Some(user) = db.get_user_by_username(&profile.login).await? {
        return Ok(if user.is_oauth_user {
            Resolution::OAuthUsernameMismatch(user)
        } else {
            Resolution::UsernameConflict(user)
        });
    }

    Ok(Resolution::Create(NewUser::oauth(
        profile.login.clone(),
        profile.primary_email.clone(),
        profile.external_id.clone(),
        profile.avatar_url.clone(),
    )))
}

/// GitHub sign-in service
pub struct IdentityService {
    db: Arc<Database>,
    sessions: Arc<SessionStore>,
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityService {
    pub fn new(
        db: Arc<Database>,
        sessions: Arc<SessionStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            db,
            sessions,
            provider,
        }
    }

    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AppError> {
        self.provider.authorization_url(redirect_uri, state)
    }

    /// Finish the authorization code flow
    ///
    /// A session is established only for `Existing` and `Created`. New users
    /// are inserted in the same transaction that binds the session.
    ///
    /// # Errors
    /// Any provider, parsing or storage failure. No user is created and the
    /// session is left as it was.
    pub async fn complete_login(
        &self,
        session: &mut Session,
        code: &str,
        redirect_uri: &str,
    ) -> Result<GitHubLoginOutcome, AppError> {
        let access_token = self.provider.exchange_code(code, redirect_uri).await?;
        let profile = self.provider.fetch_profile(&access_token).await?;
        if profile.login.trim().is_empty() || profile.external_id.is_empty() {
            return Err(AppError::Upstream(
                "GitHub profile is missing login or id".to_string(),
            ));
        }

        match resolve(&self.db, &profile).await? {
            Resolution::Existing(user) => {
                self.sessions.login(session, user.id).await?;
                record_auth_event("oauth", "existing_user");
                tracing::info!(user_id = user.id, "GitHub user logged in");
                Ok(GitHubLoginOutcome::Existing(user))
            }
            Resolution::UsernameConflict(user) => {
                record_auth_event("oauth", "username_conflict");
                tracing::info!(
                    user_id = user.id,
                    login = %profile.login,
                    "GitHub login collides with a local account"
                );
                Ok(GitHubLoginOutcome::UsernameConflict)
            }
            Resolution::OAuthUsernameMismatch(user) => {
                record_auth_event("oauth", "inconsistent");
                tracing::warn!(
                    user_id = user.id,
                    stored_github_id = ?user.github_id,
                    github_id = %profile.external_id,
                    login = %profile.login,
                    "GitHub login matches an OAuth user with a different GitHub id"
                );
                Err(AppError::Conflict(
                    "GitHub login is already used by another OAuth account".to_string(),
                ))
            }
            Resolution::Create(new_user) => {
                let pending = self.sessions.begin_login(session);
                let user = self
                    .db
                    .insert_user_with_session(
                        &new_user,
                        pending.record(),
                        pending.replaced_token_hash(),
                    )
                    .await?;
                self.sessions.finish_login(session, pending, user.id);

                record_auth_event("oauth", "new_user");
                tracing::info!(user_id = user.id, username = %user.username, "GitHub user created");
                Ok(GitHubLoginOutcome::Created(user))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockIdentityProvider;
    use tempfile::TempDir;

    fn profile(id: &str, login: &str) -> ProviderProfile {
        ProviderProfile {
            external_id: id.to_string(),
            login: login.to_string(),
            avatar_url: Some(format!("https://avatars.example/{id}")),
            primary_email: Some(format!("{login}@example.com")),
        }
    }

    async fn setup(
        provider: MockIdentityProvider,
    ) -> (IdentityService, Arc<Database>, Arc<SessionStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        let config = crate::config::tests::valid_config();
        let sessions = Arc::new(SessionStore::new(db.clone(), &config));
        let service = IdentityService::new(db.clone(), sessions.clone(), Arc::new(provider));
        (service, db, sessions, temp_dir)
    }

    fn provider_returning(profile: ProviderProfile) -> MockIdentityProvider {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_exchange_code()
            .returning(|_, _| Ok("gho_token".to_string()));
        provider
            .expect_fetch_profile()
            .returning(move |_| Ok(profile.clone()));
        provider
    }

    #[tokio::test]
    async fn resolve_prefers_provider_id_over_username() {
        let (_service, db, _sessions, _dir) = setup(MockIdentityProvider::new()).await;
        let existing = db
            .insert_user(&NewUser::oauth("old-login", None, "42", None))
            .await
            .unwrap();
        db.insert_user(&NewUser::local("octocat")).await.unwrap();

        let resolution = resolve(&db, &profile("42", "octocat")).await.unwrap();
        assert!(matches!(resolution, Resolution::Existing(user) if user.id == existing.id));
    }

    #[tokio::test]
    async fn resolve_flags_local_username_conflict() {
        let (_service, db, _sessions, _dir) = setup(MockIdentityProvider::new()).await;
        db.insert_user(&NewUser::local("octocat")).await.unwrap();

        let resolution = resolve(&db, &profile("42", "octocat")).await.unwrap();
        assert!(matches!(resolution, Resolution::UsernameConflict(_)));
    }

    #[tokio::test]
    async fn resolve_flags_oauth_username_mismatch() {
        let (_service, db, _sessions, _dir) = setup(MockIdentityProvider::new()).await;
        db.insert_user(&NewUser::oauth("octocat", None, "7", None))
            .await
            .unwrap();

        let resolution = resolve(&db, &profile("42", "octocat")).await.unwrap();
        assert!(matches!(resolution, Resolution::OAuthUsernameMismatch(_)));
    }

    #[tokio::test]
    async fn resolve_proposes_oauth_user() {
        let (_service, db, _sessions, _dir) = setup(MockIdentityProvider::new()).await;

        let resolution = resolve(&db, &profile("42", "octocat")).await.unwrap();
        let Resolution::Create(new_user) = resolution else {
            panic!("expected Create");
        };
        assert_eq!(new_user.username, "octocat");
        assert_eq!(new_user.github_id.as_deref(), Some("42"));
        assert_eq!(new_user.email.as_deref(), Some("octocat@example.com"));
        assert!(new_user.is_oauth_user);
    }

    #[tokio::test]
    async fn new_github_user_is_created_and_logged_in() {
        let (service, db, _sessions, _dir) = setup(provider_returning(profile("42", "octocat"))).await;

        let mut session = Session::anonymous();
        let outcome = service
            .complete_login(&mut session, "code", "http://localhost/cb")
            .await
            .unwrap();

        let GitHubLoginOutcome::Created(user) = outcome else {
            panic!("expected Created");
        };
        assert!(user.is_oauth_user);
        assert_eq!(user.avatar_url.as_deref(), Some("https://avatars.example/42"));
        assert_eq!(session.current_user_id(), Some(user.id));
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn existing_github_user_logs_in_without_creating() {
        let (service, db, _sessions, _dir) = setup(provider_returning(profile("42", "octocat"))).await;
        let existing = db
            .insert_user(&NewUser::oauth("octocat", None, "42", None))
            .await
            .unwrap();

        let mut session = Session::anonymous();
        let outcome = service
            .complete_login(&mut session, "code", "http://localhost/cb")
            .await
            .unwrap();

        assert!(matches!(outcome, GitHubLoginOutcome::Existing(user) if user.id == existing.id));
        assert_eq!(session.current_user_id(), Some(existing.id));
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn username_conflict_writes_nothing() {
        let (service, db, _sessions, _dir) = setup(provider_returning(profile("42", "octocat"))).await;
        let local = db.insert_user(&NewUser::local("octocat")).await.unwrap();

        let mut session = Session::anonymous();
        let outcome = service
            .complete_login(&mut session, "code", "http://localhost/cb")
            .await
            .unwrap();

        assert!(matches!(outcome, GitHubLoginOutcome::UsernameConflict));
        assert!(!session.is_authenticated());
        assert_eq!(db.count_users().await.unwrap(), 1);
        let unchanged = db.get_user(local.id).await.unwrap().unwrap();
        assert_eq!(unchanged.github_id, None);
        assert!(!unchanged.is_oauth_user);
    }

    #[tokio::test]
    async fn oauth_username_mismatch_fails_without_writing() {
        let (service, db, _sessions, _dir) = setup(provider_returning(profile("42", "octocat"))).await;
        db.insert_user(&NewUser::oauth("octocat", None, "7", None))
            .await
            .unwrap();

        let mut session = Session::anonymous();
        let result = service
            .complete_login(&mut session, "code", "http://localhost/cb")
            .await;

        assert!(result.is_err());
        assert!(!session.is_authenticated());
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn provider_failure_creates_nothing() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_exchange_code()
            .returning(|_, _| Err(AppError::Upstream("bad_verification_code".to_string())));
        provider.expect_fetch_profile().never();
        let (service, db, _sessions, _dir) = setup(provider).await;

        let mut session = Session::anonymous();
        let result = service
            .complete_login(&mut session, "code", "http://localhost/cb")
            .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert!(!session.is_authenticated());
        assert_eq!(db.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_profile_is_rejected() {
        let (service, db, _sessions, _dir) = setup(provider_returning(profile("42", ""))).await;

        let mut session = Session::anonymous();
        let result = service
            .complete_login(&mut session, "code", "http://localhost/cb")
            .await;

        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(db.count_users().await.unwrap(), 0);
    }
}
