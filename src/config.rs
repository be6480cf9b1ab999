//! Configuration management
//!
//! Sources, later ones winning: built-in defaults, `config/default.toml`,
//! `config/local.toml`, then `BREWNOTES__SECTION__KEY` environment variables.

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 5555)
    pub port: u16,
    /// Public domain (e.g., "coffee.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://coffee.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign session cookies (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
    /// How often expired sessions are purged (default: 3600)
    pub session_cleanup_interval_seconds: u64,
    /// Where the OAuth callback sends the browser afterwards (default: "/")
    pub frontend_url: String,
    pub github: GitHubOAuthConfig,
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Authorization page (default: https://github.com/login/oauth/authorize)
    pub authorize_url: String,
    /// Token exchange endpoint (default: https://github.com/login/oauth/access_token)
    pub token_url: String,
    /// REST API root (default: https://api.github.com)
    pub api_base_url: String,
    /// Requested scope (default: "user:email")
    pub scope: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load and validate configuration
    ///
    /// # Errors
    /// `AppError::Config` when a source cannot be parsed or validation fails
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5555)?
            .set_default("server.domain", "localhost:5555")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/brewnotes.db")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("auth.session_cleanup_interval_seconds", 3600)?
            .set_default("auth.frontend_url", "/")?
            .set_default("auth.github.client_id", "")?
            .set_default("auth.github.client_secret", "")?
            .set_default(
                "auth.github.authorize_url",
                "https://github.com/login/oauth/authorize",
            )?
            .set_default(
                "auth.github.token_url",
                "https://github.com/login/oauth/access_token",
            )?
            .set_default("auth.github.api_base_url", "https://api.github.com")?
            .set_default("auth.github.scope", "user:email")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("BREWNOTES")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    /// Absolute URL GitHub redirects back to after authorization
    pub fn github_redirect_uri(&self) -> String {
        format!("{}/auth/github/callback", self.server.base_url())
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        for (key, value) in [
            ("auth.github.authorize_url", &self.auth.github.authorize_url),
            ("auth.github.token_url", &self.auth.github.token_url),
            ("auth.github.api_base_url", &self.auth.github.api_base_url),
        ] {
            url::Url::parse(value).map_err(|e| {
                crate::error::AppError::Config(format!("{key} is not a valid URL: {e}"))
            })?;
        }

        if self.auth.github.client_id.trim().is_empty()
            || self.auth.github.client_secret.trim().is_empty()
        {
            tracing::warn!(
                "auth.github.client_id or auth.github.client_secret is not set; GitHub sign-in will fail"
            );
        }

        let is_https = self.server.protocol.eq_ignore_ascii_case("https");
        if is_local_server_domain(&self.server.domain) {
            if !is_https {
                tracing::warn!(
                    host = %domain_host(&self.server.domain),
                    "Session cookies are sent without the Secure flag (local development)"
                );
            }
        } else if !is_https {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

/// Host part of `server.domain`, lowercased, without port or trailing dot
fn domain_host(domain: &str) -> String {
    let domain = domain.trim();
    url::Url::parse(&format!("http://{domain}"))
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .unwrap_or_else(|| domain.to_owned())
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Loopback hosts may run over plain http with non-secure cookies
fn is_local_server_domain(domain: &str) -> bool {
    let host = domain_host(domain);
    let host = host.trim_start_matches('[').trim_end_matches(']');

    host == "localhost"
        || host.ends_with(".localhost")
        || host
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback() || ip.is_unspecified())
}
