//! Authentication middleware and extractors
//!
//! Protects routes that require a logged-in user and exposes the
//! request-scoped [`Session`] to handlers.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use super::session::{SESSION_COOKIE, Session};
use crate::AppState;
use crate::error::AppError;

async fn load_session(headers: &HeaderMap, state: &AppState) -> Result<Session, AppError> {
    let jar = CookieJar::from_headers(headers);
    let cookie_value = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_owned());
    state.sessions.load(cookie_value.as_deref()).await
}

/// Middleware to require an authenticated session
///
/// Adds the [`Session`] to request extensions if a user is logged in.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/notes", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let session = load_session(request.headers(), &state).await?;
    if !session.is_authenticated() {
        return Err(AppError::unauthorized("Not logged in"));
    }

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Extractor for the caller's session, authenticated or not
///
/// Handlers that log in or out take this and pass it to
/// [`super::SessionStore`].
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(CurrentSession(session));
        }

        let app_state = AppState::from_ref(state);
        let session = load_session(&parts.headers, &app_state).await?;
        parts.extensions.insert(session.clone());

        Ok(CurrentSession(session))
    }
}

/// Extractor for the authenticated user's id
///
/// Rejects with 401 when the session has no user.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;
        session
            .current_user_id()
            .map(CurrentUser)
            .ok_or_else(|| AppError::unauthorized("Not logged in"))
    }
}
