//! GitHub as an external identity provider
//!
//! [`IdentityProvider`] is the seam between the OAuth flow and GitHub's
//! HTTP API; [`GitHubClient`] is the reqwest implementation.

use std::time::Instant;

use axum::async_trait;
use serde::Deserialize;

use crate::config::GitHubOAuthConfig;
use crate::error::AppError;
use crate::metrics::observe_github_request;

/// Profile data the identity resolver needs from the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Provider account id, stored as `users.github_id`
    pub external_id: String,
    /// Provider login, proposed as the local username
    pub login: String,
    pub avatar_url: Option<String>,
    /// Email flagged primary on the account, if any
    pub primary_email: Option<String>,
}

/// Relying-party side of an OAuth 2.0 authorization code flow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to for authorization
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AppError>;

    /// Exchange an authorization code for an access token
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, AppError>;

    /// Fetch the account profile and select its primary email
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError>;
}

/// Token endpoint response. GitHub answers 200 with an `error` field on
/// failure, so every field is optional.
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    avatar_url: Option<String>,
}

/// One entry of `GET /user/emails`
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
}

/// GitHub OAuth client
pub struct GitHubClient {
    config: GitHubOAuthConfig,
    http: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: GitHubOAuthConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let started = Instant::now();
        let response = self
            .http
            .get(self.api_url(endpoint))
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                observe_github_request(endpoint, "error", started.elapsed());
                return Err(error.into());
            }
        };

        let status = response.status();
        observe_github_request(endpoint, status.as_str(), started.elapsed());
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "GitHub {endpoint} returned {status}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Upstream(format!("malformed GitHub {endpoint} response: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for GitHubClient {
    fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AppError> {
        let mut url = url::Url::parse(&self.config.authorize_url)
            .map_err(|e| AppError::Upstream(format!("invalid authorize URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.config.scope)
            .append_pair("state", state);
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, AppError> {
        let started = Instant::now();
        let response = self
            .http
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                observe_github_request("access_token", "error", started.elapsed());
                return Err(error.into());
            }
        };

        let status = response.status();
        observe_github_request("access_token", status.as_str(), started.elapsed());
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "GitHub token endpoint returned {status}"
            )));
        }

        let body: GitHubTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("malformed token response: {e}")))?;

        match (body.access_token, body.error) {
            (Some(token), None) if !token.is_empty() => Ok(token),
            (_, Some(error)) => Err(AppError::Upstream(format!(
                "token exchange rejected: {} ({})",
                error,
                body.error_description.unwrap_or_default()
            ))),
            _ => Err(AppError::Upstream(
                "token response carried no access token".to_string(),
            )),
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AppError> {
        let user: GitHubUser = self.get_json("user", access_token).await?;
        let emails: Vec<GitHubEmail> = self.get_json("user/emails", access_token).await?;

        Ok(ProviderProfile {
            external_id: user.id.to_string(),
            login: user.login,
            avatar_url: user.avatar_url,
            primary_email: select_primary_email(emails),
        })
    }
}

fn select_primary_email(emails: Vec<GitHubEmail>) -> Option<String> {
    emails
        .into_iter()
        .find(|email| email.primary)
        .map(|email| email.email)
}
