#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use taskflow_api::auth::jwt::{generate_access_token, JwtConfig};
use taskflow_api::auth::password::hash_password;
use taskflow_api::config::ServerConfig;
use taskflow_api::router::build_app_router;
use taskflow_api::state::AppState;
use taskflow_core::types::DbId;
use taskflow_db::models::user::CreateUser;
use taskflow_db::repositories::UserRepo;
use taskflow_events::EventBus;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Server configuration for tests: dev CORS origin, 30 second timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// The production router and middleware stack over `pool`.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::new(EventBus::default()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Insert a user with [`TEST_PASSWORD`] and return its id.
pub async fn create_user(pool: &PgPool, username: &str, role: &str) -> DbId {
    let password_hash = hash_password(TEST_PASSWORD).expect("hashing should succeed");
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash,
            role: Some(role.to_string()),
        },
    )
    .await
    .expect("user creation should succeed")
    .id
}

/// A valid access token for `user_id`.
pub fn token_for(user_id: DbId, role: &str) -> String {
    generate_access_token(user_id, role, &test_config().jwt).expect("token generation")
}

/// Create a user and return `(id, token)`.
pub async fn user_with_token(pool: &PgPool, username: &str, role: &str) -> (DbId, String) {
    let id = create_user(pool, username, role).await;
    (id, token_for(id, role))
}

// ---------------------------------------------------------------------------
// Fixtures built through the API
// ---------------------------------------------------------------------------

/// A public template whose steps are `(name, approver_id)` pairs, ordered
/// 1..n. Returns the template body.
pub async fn create_template(app: &Router, token: &str, steps: &[(&str, DbId)]) -> Value {
    let steps: Vec<Value> = steps
        .iter()
        .enumerate()
        .map(|(i, (name, approver))| {
            json!({
                "name": name,
                "step_type": "approval",
                "order": i + 1,
                "approver_ids": [approver],
            })
        })
        .collect();
    let response = post_json_auth(
        app.clone(),
        "/api/v1/workflow-templates",
        json!({ "name": "Change sign-off", "is_public": true, "steps": steps }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

/// Start an instance of `template_id` and return the instance body.
pub async fn start_instance(app: &Router, token: &str, template_id: &Value) -> Value {
    let response = post_json_auth(
        app.clone(),
        "/api/v1/workflow-instances",
        json!({ "template_id": template_id }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

/// Complete step `step_id` of instance `instance_id` with `outcome`.
pub async fn complete_step(
    app: &Router,
    token: &str,
    instance_id: &Value,
    step_id: &Value,
    outcome: &str,
) -> Response<Body> {
    post_json_auth(
        app.clone(),
        &format!("/api/v1/workflow-instances/{instance_id}/steps/{step_id}/complete"),
        json!({ "outcome": outcome, "comments": "" }),
        token,
    )
    .await
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request should complete")
}

fn json_request(method: Method, uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, json_request(Method::POST, uri, &body, None)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    send(app, json_request(Method::POST, uri, &body, Some(token))).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    send(app, json_request(Method::PUT, uri, &body, Some(token))).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}
