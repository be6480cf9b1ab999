//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use axum::{
    Form, Json, Router,
    extract::State,
    routing::{get, post},
};
use brewnotes::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

static METRICS: Once = Once::new();

/// Profile served by [`FakeGitHub`]
#[derive(Debug, Clone)]
pub struct FakeProfile {
    pub id: i64,
    pub login: String,
    pub avatar_url: String,
    pub primary_email: Option<String>,
}

impl FakeProfile {
    pub fn new(id: i64, login: &str) -> Self {
        Self {
            id,
            login: login.to_string(),
            avatar_url: format!("https://avatars.example/{id}"),
            primary_email: Some(format!("{login}@example.com")),
        }
    }
}

/// Minimal stand-in for github.com and api.github.com
///
/// The token endpoint accepts any code except `bad`. `/user` and
/// `/user/emails` serve the current [`FakeProfile`].
#[derive(Clone)]
pub struct FakeGitHub {
    pub addr: String,
    profile: Arc<Mutex<FakeProfile>>,
}

impl FakeGitHub {
    pub async fn start() -> Self {
        let profile = Arc::new(Mutex::new(FakeProfile::new(583231, "octocat")));

        let app = Router::new()
            .route("/login/oauth/access_token", post(fake_token))
            .route("/user", get(fake_user))
            .route("/user/emails", get(fake_emails))
            .with_state(profile.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, profile }
    }

    /// Serve `profile` from now on
    pub fn set_profile(&self, profile: FakeProfile) {
        *self.profile.lock().unwrap() = profile;
    }
}

async fn fake_token(Form(form): Form<std::collections::HashMap<String, String>>) -> Json<Value> {
    match form.get("code").map(String::as_str) {
        Some("bad") | None => Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        })),
        Some(_) => Json(json!({
            "access_token": "gho_fake_token",
            "token_type": "bearer",
            "scope": "user:email"
        })),
    }
}

async fn fake_user(State(profile): State<Arc<Mutex<FakeProfile>>>) -> Json<Value> {
    let profile = profile.lock().unwrap().clone();
    Json(json!({
        "id": profile.id,
        "login": profile.login,
        "avatar_url": profile.avatar_url,
    }))
}

async fn fake_emails(State(profile): State<Arc<Mutex<FakeProfile>>>) -> Json<Value> {
    let profile = profile.lock().unwrap().clone();
    let mut emails = vec![json!({
        "email": format!("{}@users.noreply.example.com", profile.login),
        "primary": false,
        "verified": true
    })];
    if let Some(email) = profile.primary_email {
        emails.push(json!({ "email": email, "primary": true, "verified": true }));
    }
    Json(Value::Array(emails))
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub github: FakeGitHub,
    pub _temp_dir: TempDir,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        METRICS.call_once(brewnotes::metrics::init_metrics);

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let github = FakeGitHub::start().await;

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 604800,
                session_cleanup_interval_seconds: 0,
                frontend_url: "/".to_string(),
                github: config::GitHubOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    authorize_url: format!("{}/login/oauth/authorize", github.addr),
                    token_url: format!("{}/login/oauth/access_token", github.addr),
                    api_base_url: github.addr.clone(),
                    scope: "user:email".to_string(),
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let app = brewnotes::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            github,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST /signup and return the response
    pub async fn signup(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/signup"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// POST /login and return the response
    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Sign up and return the `session=...` cookie pair
    pub async fn signup_session(&self, username: &str, password: &str) -> String {
        let response = self.signup(username, password).await;
        assert_eq!(response.status(), 200);
        cookie_pair(&response, "session").expect("signup sets session cookie")
    }

    /// GET `path` with `cookie` attached
    pub async fn get_with_cookie(&self, path: &str, cookie: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(reqwest::header::COOKIE, cookie)
            .send()
            .await
            .unwrap()
    }

    /// Run the GitHub sign-in flow against the fake provider
    ///
    /// Returns the callback response (a redirect). `cookie` is sent with the
    /// callback as the caller's existing session.
    pub async fn github_sign_in(&self, code: &str, cookie: Option<&str>) -> reqwest::Response {
        let response = self
            .client
            .get(self.url("/auth/github"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let state_cookie = cookie_pair(&response, "oauth_state").expect("oauth_state cookie");
        let body: Value = response.json().await.unwrap();

        let authorization_url =
            url::Url::parse(body["authorization_url"].as_str().unwrap()).unwrap();
        let state = authorization_url
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("state in authorization URL");

        let cookies = match cookie {
            Some(cookie) => format!("{state_cookie}; {cookie}"),
            None => state_cookie,
        };

        self.client
            .get(self.url("/auth/github/callback"))
            .query(&[("code", code), ("state", state.as_str())])
            .header(reqwest::header::COOKIE, cookies)
            .send()
            .await
            .unwrap()
    }
}

/// `name=value` of the first Set-Cookie header setting `name`
pub fn cookie_pair(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Location header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
        .to_string()
}
