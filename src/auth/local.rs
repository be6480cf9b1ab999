//! Local account endpoints
//!
//! Username/password signup and login, session check and logout.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_extra::extract::{CookieJar, WithRejection};
use serde::Deserialize;

use super::middleware::CurrentSession;
use super::session::{Session, SessionStore};
use crate::AppState;
use crate::api::{JsonBody, UserResponse, user_to_response};
use crate::error::AppError;
use crate::service::AccountService;

/// Routes:
/// - POST /signup
/// - GET /check_session
/// - POST /login
/// - DELETE /logout
pub(super) fn local_router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/check_session", get(check_session))
        .route("/login", post(login))
        .route("/logout", delete(logout))
}

/// Username and password body shared by signup and login
#[derive(Debug, Deserialize)]
struct CredentialsRequest {
    username: Option<String>,
    password: Option<String>,
}

fn account_service(state: &AppState) -> AccountService {
    AccountService::new(state.db.clone(), state.sessions.clone())
}

/// Add the session cookie to `jar` when the session carries a token
pub(super) fn with_session_cookie(
    store: &SessionStore,
    jar: CookieJar,
    session: &Session,
) -> CookieJar {
    match store.cookie(session) {
        Some(cookie) => jar.add(cookie),
        None => jar,
    }
}

/// POST /signup
async fn signup(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    jar: CookieJar,
    WithRejection(Json(body), _): JsonBody<CredentialsRequest>,
) -> Result<(CookieJar, Json<UserResponse>), AppError> {
    let user = account_service(&state)
        .signup(
            &mut session,
            body.username.as_deref(),
            body.password.as_deref(),
        )
        .await?;

    let jar = with_session_cookie(&state.sessions, jar, &session);
    Ok((jar, Json(user_to_response(&state.db, &user).await?)))
}

/// GET /check_session
async fn check_session(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<UserResponse>, AppError> {
    let user = account_service(&state).current_user(&session).await?;
    Ok(Json(user_to_response(&state.db, &user).await?))
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    jar: CookieJar,
    WithRejection(Json(body), _): JsonBody<CredentialsRequest>,
) -> Result<(CookieJar, Json<UserResponse>), AppError> {
    let user = account_service(&state)
        .login(
            &mut session,
            body.username.as_deref(),
            body.password.as_deref(),
        )
        .await?;

    let jar = with_session_cookie(&state.sessions, jar, &session);
    Ok((jar, Json(user_to_response(&state.db, &user).await?)))
}

/// DELETE /logout
///
/// The session row survives with no user; the cookie is left in place.
async fn logout(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
) -> Result<StatusCode, AppError> {
    account_service(&state).logout(&mut session).await?;
    Ok(StatusCode::NO_CONTENT)
}
