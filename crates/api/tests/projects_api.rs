//! Projects and tasks: the targets approvers are resolved against.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_auth, post_json_auth};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn owner_is_the_first_member(pool: PgPool) {
    let (owner, token) = common::user_with_token(&pool, "owner", "member").await;
    let app = common::build_test_app(pool);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/projects",
        json!({ "name": "Apollo", "description": "Moonshot" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let project = body_json(response).await["data"].clone();
    assert_eq!(project["owner_id"], owner);

    let response = get_auth(
        app,
        &format!("/api/v1/projects/{}/members", project["id"]),
        &token,
    )
    .await;
    let members = body_json(response).await["data"].clone();
    assert_eq!(members.as_array().unwrap().len(), 1);
    assert_eq!(members[0]["user_id"], owner);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn adding_members_is_owner_only_and_idempotent(pool: PgPool) {
    let (_, owner_token) = common::user_with_token(&pool, "owner", "member").await;
    let (other, other_token) = common::user_with_token(&pool, "other", "member").await;
    let app = common::build_test_app(pool);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/projects",
        json!({ "name": "Apollo" }),
        &owner_token,
    )
    .await;
    let id = body_json(response).await["data"]["id"].clone();
    let uri = format!("/api/v1/projects/{id}/members");

    let response = post_json_auth(app.clone(), &uri, json!({ "user_id": other }), &other_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json_auth(app.clone(), &uri, json!({ "user_id": other }), &owner_token).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json_auth(app, &uri, json!({ "user_id": other }), &owner_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn task_assignee_must_be_a_project_member(pool: PgPool) {
    let (owner, token) = common::user_with_token(&pool, "owner", "member").await;
    let outsider = common::create_user(&pool, "outsider", "member").await;
    let app = common::build_test_app(pool);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/projects",
        json!({ "name": "Apollo" }),
        &token,
    )
    .await;
    let project_id = body_json(response).await["data"]["id"].clone();

    let response = post_json_auth(
        app.clone(),
        "/api/v1/tasks",
        json!({ "project_id": project_id, "title": "Launch", "assignee_id": outsider }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/tasks",
        json!({ "project_id": project_id, "title": "Launch", "assignee_id": owner }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let task = body_json(response).await["data"].clone();
    assert_eq!(task["status"], "pending");

    let response = get_auth(app, &format!("/api/v1/tasks/{}", task["id"]), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
}
