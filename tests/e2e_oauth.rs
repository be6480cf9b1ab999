//! E2E tests for the GitHub OAuth flow against a fake GitHub

mod common;

use brewnotes::data::NewUser;
use common::{FakeProfile, TestServer, cookie_pair, location};
use serde_json::Value;

#[tokio::test]
async fn test_authorization_url_carries_client_scope_and_state() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/auth/github"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let set_cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie header")
        .to_string();
    assert!(set_cookie.starts_with("oauth_state="));
    assert!(set_cookie.contains("HttpOnly"));

    let body: Value = response.json().await.unwrap();
    let url = body["authorization_url"].as_str().unwrap();
    assert!(url.starts_with(&format!("{}/login/oauth/authorize?", server.github.addr)));
    assert!(url.contains("client_id=test-client-id"));
    assert!(url.contains("scope=user%3Aemail"));
    assert!(url.contains("state="));
    assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%2Fauth%2Fgithub%2Fcallback"));
}

#[tokio::test]
async fn test_new_github_user_is_created_and_logged_in() {
    let server = TestServer::new().await;

    let response = server.github_sign_in("good", None).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/?auth=success&new_user=true");
    let cookie = cookie_pair(&response, "session").expect("session cookie");

    let user = server
        .state
        .db
        .get_user_by_github_id("583231")
        .await
        .unwrap()
        .expect("user created");
    assert_eq!(user.username, "octocat");
    assert_eq!(user.email.as_deref(), Some("octocat@example.com"));
    assert_eq!(user.avatar_url.as_deref(), Some("https://avatars.example/583231"));
    assert!(user.is_oauth_user);
    assert!(!user.authenticate(""));

    let response = server.get_with_cookie("/check_session", &cookie).await;
    assert_eq!(response.status(), 200);
    let current: Value = response.json().await.unwrap();
    assert_eq!(current["username"], "octocat");
    assert_eq!(current["is_oauth_user"], true);
}

#[tokio::test]
async fn test_github_sign_in_rotates_existing_session_cookie() {
    let server = TestServer::new().await;
    let planted = server.signup_session("mallory", "secret2").await;

    let response = server.github_sign_in("good", Some(planted.as_str())).await;
    assert_eq!(location(&response), "/?auth=success&new_user=true");
    let issued = cookie_pair(&response, "session").expect("session cookie");
    assert_ne!(issued, planted);

    assert_eq!(
        server.get_with_cookie("/check_session", &planted).await.status(),
        401
    );
    let current: Value = server
        .get_with_cookie("/check_session", &issued)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(current["username"], "octocat");
}

#[tokio::test]
async fn test_returning_github_user_logs_in_without_creating() {
    let server = TestServer::new().await;
    let first = server.github_sign_in("good", None).await;
    assert_eq!(location(&first), "/?auth=success&new_user=true");

    let response = server.github_sign_in("good", None).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/?auth=success");
    assert!(cookie_pair(&response, "session").is_some());

    assert_eq!(server.state.db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_provider_id_wins_over_changed_login() {
    let server = TestServer::new().await;
    server.github_sign_in("good", None).await;

    server
        .github
        .set_profile(FakeProfile::new(583231, "octocat-renamed"));
    let response = server.github_sign_in("good", None).await;

    assert_eq!(location(&response), "/?auth=success");
    assert_eq!(server.state.db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_login_colliding_with_local_user_is_a_conflict() {
    let server = TestServer::new().await;
    assert_eq!(server.signup("octocat", "secret1").await.status(), 200);

    let response = server.github_sign_in("good", None).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/?auth=error&message=username_conflict");
    assert!(cookie_pair(&response, "session").is_none());

    assert_eq!(server.state.db.count_users().await.unwrap(), 1);
    let local = server
        .state
        .db
        .get_user_by_username("octocat")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(local.github_id, None);
    assert!(!local.is_oauth_user);
    assert!(local.authenticate("secret1"));
}

#[tokio::test]
async fn test_login_colliding_with_other_oauth_user_fails() {
    let server = TestServer::new().await;
    server
        .state
        .db
        .insert_user(&NewUser::oauth("octocat", None, "7", None))
        .await
        .unwrap();

    let response = server.github_sign_in("good", None).await;
    assert_eq!(location(&response), "/?auth=error&message=oauth_failed");
    assert!(cookie_pair(&response, "session").is_none());
    assert_eq!(server.state.db.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_rejected_code_fails_without_creating() {
    let server = TestServer::new().await;

    let response = server.github_sign_in("bad", None).await;
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/?auth=error&message=oauth_failed");
    assert!(cookie_pair(&response, "session").is_none());
    assert_eq!(server.state.db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_callback_with_mismatched_state_fails() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/auth/github/callback"))
        .query(&[("code", "good"), ("state", "forged")])
        .header(reqwest::header::COOKIE, "oauth_state=expected")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/?auth=error&message=oauth_failed");

    let response = server
        .client
        .get(server.url("/auth/github/callback"))
        .query(&[("code", "good"), ("state", "expected")])
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), "/?auth=error&message=oauth_failed");

    assert_eq!(server.state.db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_callback_with_provider_error_fails() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/auth/github/callback"))
        .query(&[("error", "access_denied"), ("state", "s")])
        .header(reqwest::header::COOKIE, "oauth_state=s")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 302);
    assert_eq!(location(&response), "/?auth=error&message=oauth_failed");
}

#[tokio::test]
async fn test_missing_primary_email_creates_user_without_email() {
    let server = TestServer::new().await;
    let mut profile = FakeProfile::new(42, "no-email");
    profile.primary_email = None;
    server.github.set_profile(profile);

    let response = server.github_sign_in("good", None).await;
    assert_eq!(location(&response), "/?auth=success&new_user=true");

    let user = server
        .state
        .db
        .get_user_by_github_id("42")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.email, None);
}

#[tokio::test]
async fn test_oauth_user_cannot_use_local_login() {
    let server = TestServer::new().await;
    server.github_sign_in("good", None).await;

    let response = server.login("octocat", "").await;
    assert_eq!(response.status(), 401);

    let response = server.login("octocat", "anything").await;
    assert_eq!(response.status(), 401);
}
