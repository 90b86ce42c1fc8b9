#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    middleware,
    response::Response,
    Router,
};
use serde_json::{json, Value};
use teamhub_api::{
    config::AppConfig, db, middleware_helpers::request_id::request_id_middleware, AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// Application wired against a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _db_dir: TempDir,
}

/// A logged-in user and the cookie header that proves it
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub cookie: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir");
        let db_path = db_dir.path().join("teamhub_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::build(Arc::new(pool), cfg).expect("app state");
        let router = Router::new()
            .nest("/api/v1", teamhub_api::api_v1_routes())
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.send(request).await
    }

    /// Sends a fully built request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn get(&self, uri: &str, session: &Session) -> Response {
        self.request(Method::GET, uri, None, Some(&session.cookie)).await
    }

    pub async fn post(&self, uri: &str, body: Value, session: &Session) -> Response {
        self.request(Method::POST, uri, Some(body), Some(&session.cookie))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value, session: &Session) -> Response {
        self.request(Method::PUT, uri, Some(body), Some(&session.cookie))
            .await
    }

    pub async fn delete(&self, uri: &str, session: &Session) -> Response {
        self.request(Method::DELETE, uri, None, Some(&session.cookie))
            .await
    }

    /// Registers an account and logs it in.
    pub async fn sign_up(&self, email: &str, name: &str) -> Session {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({ "email": email, "name": name, "password": "hunter2hunter2" })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "register {email}");
        self.log_in(email, "hunter2hunter2").await
    }

    pub async fn log_in(&self, email: &str, password: &str) -> Session {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login {email}");
        let cookie = session_cookie(&response).expect("session cookie");
        let body = response_json(response).await;
        Session {
            user_id: body["data"]["id"]
                .as_str()
                .and_then(|id| id.parse().ok())
                .expect("user id"),
            email: email.to_string(),
            cookie,
        }
    }

    /// Creates an FTC team owned by `session` and returns its id.
    pub async fn create_team(&self, session: &Session, number: i32, guild_id: Option<&str>) -> Uuid {
        let response = self
            .post(
                "/api/v1/teams",
                json!({
                    "program": "FTC",
                    "number": number,
                    "name": format!("Team {number}"),
                    "season": "2024-2025",
                    "discord_guild_id": guild_id,
                }),
                session,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        data_id(response).await
    }

    pub async fn add_member(&self, admin: &Session, team_id: Uuid, member: &Session, role: &str) {
        let response = self
            .post(
                &format!("/api/v1/teams/{team_id}/members"),
                json!({ "email": member.email, "role": role }),
                admin,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    pub async fn create_vendor(&self, session: &Session, team_id: Uuid, name: &str) -> Uuid {
        let response = self
            .post(
                &format!("/api/v1/teams/{team_id}/vendors"),
                json!({ "name": name, "website": "https://example.com" }),
                session,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        data_id(response).await
    }

    pub async fn create_part(
        &self,
        session: &Session,
        team_id: Uuid,
        name: &str,
        quantity: i32,
        reorder_point: i32,
    ) -> Uuid {
        let response = self
            .post(
                &format!("/api/v1/teams/{team_id}/parts"),
                json!({
                    "name": name,
                    "quantity": quantity,
                    "reorder_point": reorder_point,
                }),
                session,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        data_id(response).await
    }
}

/// `name=value` from the first `Set-Cookie` header.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn data_id(response: Response) -> Uuid {
    let body = response_json(response).await;
    body["data"]["id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .expect("id in response data")
}
