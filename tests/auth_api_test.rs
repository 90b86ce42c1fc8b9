mod common;

use axum::http::{header, Method, StatusCode};
use serde_json::json;

use common::{response_json, TestApp};

#[tokio::test]
async fn login_issues_http_only_session_cookie() {
    let app = TestApp::new().await;
    let register = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "email": "ada@example.com", "name": "Ada", "password": "hunter2hunter2" })),
            None,
        )
        .await;
    assert_eq!(register.status(), StatusCode::CREATED);
    let body = response_json(register).await;
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert!(body["data"].get("password_hash").is_none());

    let login = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "ada@example.com", "password": "hunter2hunter2" })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let set_cookie = login
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("set-cookie")
        .to_string();
    assert!(set_cookie.starts_with("teamhub_session="));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn me_requires_a_session_and_logout_revokes_it() {
    let app = TestApp::new().await;
    let session = app.sign_up("grace@example.com", "Grace").await;

    let anonymous = app.request(Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let me = app.get("/api/v1/auth/me", &session).await;
    assert_eq!(me.status(), StatusCode::OK);
    let body = response_json(me).await;
    assert_eq!(body["data"]["name"], "Grace");

    let logout = app
        .request(Method::POST, "/api/v1/auth/logout", None, Some(&session.cookie))
        .await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let after = app.get("/api/v1/auth/me", &session).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_and_duplicates_are_rejected() {
    let app = TestApp::new().await;
    app.sign_up("linus@example.com", "Linus").await;

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "email": "linus@example.com", "name": "Other", "password": "hunter2hunter2" })),
            None,
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let wrong_password = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "linus@example.com", "password": "not-the-password" })),
            None,
        )
        .await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

    let short_password = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "email": "new@example.com", "name": "New", "password": "short" })),
            None,
        )
        .await;
    assert_eq!(short_password.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_links_discord_account_and_deletion_ends_access() {
    let app = TestApp::new().await;
    let session = app.sign_up("margaret@example.com", "Margaret").await;

    let updated = app
        .put(
            "/api/v1/auth/me",
            json!({ "name": "Margaret H.", "discord_user_id": "1234567890" }),
            &session,
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let body = response_json(updated).await;
    assert_eq!(body["data"]["discord_user_id"], "1234567890");
    assert_eq!(body["data"]["name"], "Margaret H.");

    let linked = app
        .state
        .services
        .auth
        .find_by_discord_id("1234567890")
        .await
        .unwrap()
        .expect("linked account");
    assert_eq!(linked.id, session.user_id);

    let deleted = app.delete("/api/v1/auth/me", &session).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let login = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "margaret@example.com", "password": "hunter2hunter2" })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
}
