//! Session management
//!
//! A session is an opaque random token carried in the `session` cookie.
//! The cookie value is `token.hmac_sha256(token)` so forged cookies are
//! rejected before any lookup, and the server keeps only the SHA-256 of the
//! token, mapped to the current user id (NULL once logged out).
//!
//! Handlers never touch global state: they receive a request-scoped
//! [`Session`] (see [`super::CurrentSession`]) and hand it back to
//! [`SessionStore`] to log in or out.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::data::{Database, SessionRecord};
use crate::error::AppError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

type HmacSha256 = Hmac<Sha256>;

/// Request-scoped view of the caller's session
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<String>,
    user_id: Option<i64>,
}

impl Session {
    /// A session with no token and no user
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// The authenticated user, if any
    pub fn current_user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// A login that has been prepared but not yet persisted
///
/// Produced by [`SessionStore::begin_login`]; the caller writes
/// [`PendingLogin::record`] (possibly inside a larger transaction) and then
/// calls [`SessionStore::finish_login`]. The token is always fresh; the
/// caller's previous token, if any, must be deleted in the same write.
#[derive(Debug)]
pub struct PendingLogin {
    token: String,
    record: SessionRecord,
    replaced: Option<String>,
}

impl PendingLogin {
    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Hash of the token this login supersedes
    pub fn replaced_token_hash(&self) -> Option<&str> {
        self.replaced.as_deref()
    }
}

/// Process-wide session store backed by the `sessions` table
pub struct SessionStore {
    db: Arc<Database>,
    secret: String,
    max_age: i64,
    secure_cookies: bool,
}

impl SessionStore {
    pub fn new(db: Arc<Database>, config: &AppConfig) -> Self {
        Self {
            db,
            secret: config.auth.session_secret.clone(),
            max_age: config.auth.session_max_age,
            secure_cookies: config.should_use_secure_cookies(),
        }
    }

    /// Resolve the session for a request from its cookie value
    ///
    /// Missing, forged, unknown and expired cookies all resolve to an
    /// anonymous session rather than an error.
    pub async fn load(&self, cookie_value: Option<&str>) -> Result<Session, AppError> {
        let Some(token) = cookie_value.and_then(|value| self.verify_cookie_value(value)) else {
            return Ok(Session::anonymous());
        };

        let Some(record) = self.db.get_session(&hash_token(&token)).await? else {
            return Ok(Session::anonymous());
        };

        if record.expires_at <= Utc::now().timestamp() {
            tracing::debug!("Ignoring expired session");
            return Ok(Session::anonymous());
        }

        Ok(Session {
            token: Some(token),
            user_id: record.user_id,
        })
    }

    /// Prepare a login for `session` under a newly generated token
    pub fn begin_login(&self, session: &Session) -> PendingLogin {
        let token = generate_token();
        let now = Utc::now().timestamp();

        PendingLogin {
            record: SessionRecord {
                token_hash: hash_token(&token),
                user_id: None,
                created_at: now,
                expires_at: now + self.max_age,
            },
            token,
            replaced: session.token.as_deref().map(hash_token),
        }
    }

    /// Bind the request-scoped session to `user_id` once the row is stored
    pub fn finish_login(&self, session: &mut Session, pending: PendingLogin, user_id: i64) {
        session.token = Some(pending.token);
        session.user_id = Some(user_id);
    }

    /// Associate the session with `user_id`, overwriting any previous user
    ///
    /// The token is rotated on every call and the old cookie stops resolving.
    /// Calling this twice with the same id still leaves `user_id` logged in.
    pub async fn login(&self, session: &mut Session, user_id: i64) -> Result<(), AppError> {
        let mut pending = self.begin_login(session);
        pending.record.user_id = Some(user_id);
        self.db
            .replace_session(&pending.record, pending.replaced_token_hash())
            .await?;
        self.finish_login(session, pending, user_id);
        Ok(())
    }

    /// Clear the user from the session
    ///
    /// # Errors
    /// `AppError::Unauthorized` when no user is associated with the session
    pub async fn logout(&self, session: &mut Session) -> Result<(), AppError> {
        let (Some(token), Some(user_id)) = (session.token.as_deref(), session.user_id) else {
            return Err(AppError::unauthorized("Not authorized"));
        };

        if !self.db.clear_session_user(&hash_token(token)).await? {
            return Err(AppError::unauthorized("Not authorized"));
        }

        tracing::debug!(user_id, "Session cleared");
        session.user_id = None;
        Ok(())
    }

    /// Cookie carrying the session token, if the session has one
    pub fn cookie(&self, session: &Session) -> Option<Cookie<'static>> {
        let token = session.token.as_deref()?;
        Some(
            Cookie::build((SESSION_COOKIE, self.sign(token)))
                .path("/")
                .http_only(true)
                .secure(self.secure_cookies)
                .same_site(SameSite::Lax)
                .build(),
        )
    }

    /// Remove expired session rows
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let removed = self
            .db
            .delete_expired_sessions(Utc::now().timestamp())
            .await?;
        crate::metrics::SESSIONS_PURGED_TOTAL.inc_by(removed);
        Ok(removed)
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take key of any size")
    }

    fn sign(&self, token: &str) -> String {
        let mut mac = self.mac();
        mac.update(token.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", token, signature)
    }

    fn verify_cookie_value(&self, value: &str) -> Option<String> {
        let (token, signature_b64) = value.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;

        let mut mac = self.mac();
        mac.update(token.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(token.to_string())
    }
}

pub(crate) fn generate_token() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_token(token: &str) -> String {
    format!("sha256:{}", URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes())))
}
