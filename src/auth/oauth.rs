//! GitHub OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub, plus
//! linking a GitHub identity to a logged-in local account.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::{Deserialize, Serialize};

use super::local::{local_router, with_session_cookie};
use super::middleware::CurrentSession;
use super::session::{SESSION_COOKIE, Session, generate_token};
use crate::AppState;
use crate::api::MessageResponse;
use crate::error::AppError;
use crate::service::{GitHubLoginOutcome, IdentityService, LinkStatus, LinkingService};

const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_PATH: &str = "/auth/github";

/// Create authentication router
///
/// Routes:
/// - GET /auth/github - Authorization URL for the frontend
/// - GET /auth/github/callback - OAuth callback
/// - POST /auth/github/link - Link GitHub to the current account
/// - GET /auth/status - OAuth facts about the current user
/// - plus the local account routes
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/github", get(github_authorize))
        .route("/auth/github/callback", get(github_callback))
        .route("/auth/github/link", post(link_github))
        .route("/auth/status", get(auth_status))
        .merge(local_router())
}

fn identity_service(state: &AppState) -> IdentityService {
    IdentityService::new(
        state.db.clone(),
        state.sessions.clone(),
        state.github.clone(),
    )
}

// =============================================================================
// GitHub OAuth
// =============================================================================

#[derive(Debug, Serialize)]
struct AuthorizationUrlResponse {
    authorization_url: String,
}

/// GET /auth/github
///
/// Returns the GitHub authorization URL instead of redirecting, so the
/// frontend decides when to navigate.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Build the URL with client_id, redirect_uri, scope, state
async fn github_authorize(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthorizationUrlResponse>), AppError> {
    let csrf_state = generate_token();
    let authorization_url = identity_service(&state)
        .authorization_url(&state.config.github_redirect_uri(), &csrf_state)
        .map_err(|error| {
            tracing::error!(%error, "Failed to create authorization URL");
            AppError::Internal(anyhow::anyhow!("Failed to create authorization URL"))
        })?;

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, csrf_state))
        .path(OAUTH_STATE_PATH)
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .build();

    Ok((
        jar.add(cookie),
        Json(AuthorizationUrlResponse { authorization_url }),
    ))
}

/// Query parameters from GitHub callback
#[derive(Debug, Deserialize)]
struct GitHubCallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Set when the user denied access
    error: Option<String>,
}

/// GET /auth/github/callback
///
/// Handles OAuth callback from GitHub. Always answers with a redirect to
/// the frontend; failure detail stays in the server log.
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for access token and fetch the profile
/// 3. Resolve the profile to a local user
/// 4. Set the session cookie on success
/// 5. Redirect to the frontend with the outcome
async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<GitHubCallbackQuery>,
    jar: CookieJar,
) -> Response {
    let expected_state = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value().to_owned());
    let jar = jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path(OAUTH_STATE_PATH));

    let mut session = match load_session(&state, &jar).await {
        Ok(session) => session,
        Err(error) => {
            tracing::error!(%error, "Failed to load session during GitHub callback");
            return (jar, frontend_redirect(&state, "auth=error&message=oauth_failed"))
                .into_response();
        }
    };

    let result = match verify_callback(&query, expected_state.as_deref()) {
        Ok(code) => {
            identity_service(&state)
                .complete_login(&mut session, code, &state.config.github_redirect_uri())
                .await
        }
        Err(error) => Err(error),
    };

    let params = match result {
        Ok(GitHubLoginOutcome::Existing(_)) => "auth=success",
        Ok(GitHubLoginOutcome::Created(_)) => "auth=success&new_user=true",
        Ok(GitHubLoginOutcome::UsernameConflict) => "auth=error&message=username_conflict",
        Err(error) => {
            tracing::warn!(%error, "GitHub sign-in failed");
            "auth=error&message=oauth_failed"
        }
    };

    let jar = if session.is_authenticated() {
        with_session_cookie(&state.sessions, jar, &session)
    } else {
        jar
    };

    (jar, frontend_redirect(&state, params)).into_response()
}

async fn load_session(state: &AppState, jar: &CookieJar) -> Result<Session, AppError> {
    let cookie_value = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_owned());
    state.sessions.load(cookie_value.as_deref()).await
}

/// Check the provider's answer before any upstream call is made
fn verify_callback<'a>(
    query: &'a GitHubCallbackQuery,
    expected_state: Option<&str>,
) -> Result<&'a str, AppError> {
    if let Some(error) = query.error.as_deref() {
        return Err(AppError::Upstream(format!("authorization denied: {error}")));
    }

    match (query.state.as_deref(), expected_state) {
        (Some(received), Some(expected)) if !expected.is_empty() && received == expected => {}
        _ => {
            return Err(AppError::Unauthorized(
                "OAuth state missing or mismatched".to_string(),
            ));
        }
    }

    query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Validation("authorization code missing".to_string()))
}

/// 302 to the frontend with `params` as the query string
fn frontend_redirect(state: &AppState, params: &str) -> Response {
    let base = &state.config.auth.frontend_url;
    let separator = if base.contains('?') { '&' } else { '?' };
    let location = format!("{base}{separator}{params}");

    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

// =============================================================================
// Account linking
// =============================================================================

/// POST /auth/github/link body
///
/// `github_id` is accepted as a string or a number.
#[derive(Debug, Deserialize)]
struct LinkRequest {
    github_id: Option<serde_json::Value>,
    avatar_url: Option<String>,
}

impl LinkRequest {
    fn github_id(&self) -> Option<String> {
        match self.github_id.as_ref()? {
            serde_json::Value::String(id) => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// POST /auth/github/link
///
/// The session is checked before the body is looked at.
async fn link_github(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    body: Result<Json<LinkRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    LinkingService::require_login(session.current_user_id())?;
    let Json(body) = body?;

    LinkingService::new(state.db.clone())
        .link(
            session.current_user_id(),
            body.github_id(),
            body.avatar_url.clone(),
        )
        .await?;

    Ok(Json(MessageResponse::new(
        "GitHub account linked successfully",
    )))
}

/// GET /auth/status
async fn auth_status(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<LinkStatus>, AppError> {
    let status = LinkingService::new(state.db.clone())
        .status(session.current_user_id())
        .await?;
    Ok(Json(status))
}
