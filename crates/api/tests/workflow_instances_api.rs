//! Workflow instance progression over HTTP.

mod common;

use axum::http::StatusCode;
use common::{body_json, complete_step, get_auth, post_json_auth};
use serde_json::{json, Value};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn two_step_workflow_runs_to_approval(pool: PgPool) {
    let (lead, lead_token) = common::user_with_token(&pool, "lead", "member").await;
    let (finance, finance_token) = common::user_with_token(&pool, "finance", "member").await;
    let app = common::build_test_app(pool);

    let template =
        common::create_template(&app, &lead_token, &[("Lead", lead), ("Finance", finance)]).await;
    let first = template["steps"][0]["id"].clone();
    let second = template["steps"][1]["id"].clone();

    let instance = common::start_instance(&app, &lead_token, &template["id"]).await;
    assert_eq!(instance["status"], "running");
    assert_eq!(instance["current_step_id"], first);
    assert_eq!(instance["step_instances"].as_array().unwrap().len(), 1);
    assert_eq!(instance["step_instances"][0]["status"], "pending");

    let response = complete_step(&app, &lead_token, &instance["id"], &first, "approved").await;
    assert_eq!(response.status(), StatusCode::OK);
    let instance = body_json(response).await["data"].clone();
    assert_eq!(instance["status"], "running");
    assert_eq!(instance["current_step_id"], second);
    assert_eq!(instance["current_step"]["name"], "Finance");

    let response =
        complete_step(&app, &finance_token, &instance["id"], &second, "approved").await;
    assert_eq!(response.status(), StatusCode::OK);
    let instance = body_json(response).await["data"].clone();
    assert_eq!(instance["status"], "completed");
    assert_eq!(instance["result"], "approved");
    // The final step stays current after completion.
    assert_eq!(instance["current_step_id"], second);
    assert_eq!(instance["current_step"]["name"], "Finance");
    assert!(instance["completed_at"].is_string());

    let steps = instance["step_instances"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| s["status"] == "completed"));
    assert_eq!(steps[1]["completed_by"], finance);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rejecting_a_required_step_finishes_the_instance(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &token, &[("Lead", lead), ("QA", lead)]).await;
    let first = template["steps"][0]["id"].clone();
    let instance = common::start_instance(&app, &token, &template["id"]).await;

    let response = complete_step(&app, &token, &instance["id"], &first, "rejected").await;
    assert_eq!(response.status(), StatusCode::OK);
    let instance = body_json(response).await["data"].clone();

    assert_eq!(instance["status"], "completed");
    assert_eq!(instance["result"], "rejected");
    // The later step is never reached.
    assert_eq!(instance["step_instances"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn skipping_a_step_moves_on(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &token, &[("Lead", lead), ("QA", lead)]).await;
    let first = template["steps"][0]["id"].clone();
    let instance = common::start_instance(&app, &token, &template["id"]).await;

    let response = complete_step(&app, &token, &instance["id"], &first, "skipped").await;
    let instance = body_json(response).await["data"].clone();

    assert_eq!(instance["status"], "running");
    assert_eq!(instance["current_step_id"], template["steps"][1]["id"]);
    assert_eq!(instance["step_instances"][0]["status"], "skipped");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn error_outcome_ends_instance_in_error(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &token, &[("Lead", lead), ("QA", lead)]).await;
    let first = template["steps"][0]["id"].clone();
    let instance = common::start_instance(&app, &token, &template["id"]).await;

    let response = complete_step(&app, &token, &instance["id"], &first, "error").await;
    let instance = body_json(response).await["data"].clone();

    assert_eq!(instance["status"], "error");
    assert_eq!(instance["result"], "error");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn begin_step_claims_the_current_step(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &token, &[("Lead", lead)]).await;
    let first = template["steps"][0]["id"].clone();
    let instance = common::start_instance(&app, &token, &template["id"]).await;
    let uri = format!(
        "/api/v1/workflow-instances/{}/steps/{first}/begin",
        instance["id"]
    );

    let response = post_json_auth(app.clone(), &uri, json!({}), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let step = body_json(response).await["data"].clone();
    assert_eq!(step["status"], "in_progress");
    assert_eq!(step["assigned_to"], lead);
    assert!(step["started_at"].is_string());

    let response = post_json_auth(app, &uri, json!({}), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Refusals
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn completing_a_finished_step_is_409(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &token, &[("Lead", lead), ("QA", lead)]).await;
    let first = template["steps"][0]["id"].clone();
    let instance = common::start_instance(&app, &token, &template["id"]).await;

    let response = complete_step(&app, &token, &instance["id"], &first, "approved").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = complete_step(&app, &token, &instance["id"], &first, "approved").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INVALID_TRANSITION");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_outcome_is_400(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &token, &[("Lead", lead)]).await;
    let first = template["steps"][0]["id"].clone();
    let instance = common::start_instance(&app, &token, &template["id"]).await;

    let response = complete_step(&app, &token, &instance["id"], &first, "maybe").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn non_approver_cannot_complete_a_step(pool: PgPool) {
    let (lead, lead_token) = common::user_with_token(&pool, "lead", "member").await;
    let (_, other_token) = common::user_with_token(&pool, "other", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &lead_token, &[("Lead", lead)]).await;
    let first = template["steps"][0]["id"].clone();
    let instance = common::start_instance(&app, &other_token, &template["id"]).await;

    let response = complete_step(&app, &other_token, &instance["id"], &first, "approved").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn admin_may_complete_any_step(pool: PgPool) {
    let (lead, lead_token) = common::user_with_token(&pool, "lead", "member").await;
    let (_, admin_token) = common::user_with_token(&pool, "root", "admin").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &lead_token, &[("Lead", lead)]).await;
    let first = template["steps"][0]["id"].clone();
    let instance = common::start_instance(&app, &lead_token, &template["id"]).await;

    let response = complete_step(&app, &admin_token, &instance["id"], &first, "approved").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn completing_a_step_that_is_not_current_is_409(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &token, &[("Lead", lead), ("QA", lead)]).await;
    let second = template["steps"][1]["id"].clone();
    let instance = common::start_instance(&app, &token, &template["id"]).await;

    let response = complete_step(&app, &token, &instance["id"], &second, "approved").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn cancel_closes_open_step_and_refuses_twice(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &token, &[("Lead", lead)]).await;
    let instance = common::start_instance(&app, &token, &template["id"]).await;
    let uri = format!("/api/v1/workflow-instances/{}/cancel", instance["id"]);

    let response = post_json_auth(app.clone(), &uri, json!({}), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let instance = body_json(response).await["data"].clone();
    assert_eq!(instance["status"], "cancelled");
    assert_eq!(instance["result"], "cancelled");
    assert_eq!(instance["step_instances"][0]["status"], "cancelled");

    let response = post_json_auth(app, &uri, json!({}), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn only_the_starter_or_admin_may_cancel(pool: PgPool) {
    let (lead, lead_token) = common::user_with_token(&pool, "lead", "member").await;
    let (_, starter_token) = common::user_with_token(&pool, "starter", "member").await;
    let (_, stranger_token) = common::user_with_token(&pool, "stranger", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &lead_token, &[("Lead", lead)]).await;
    let instance = common::start_instance(&app, &starter_token, &template["id"]).await;

    let uri = format!("/api/v1/workflow-instances/{}/cancel", instance["id"]);

    // The approver can see the instance but did not start it.
    let response = post_json_auth(app.clone(), &uri, json!({}), &lead_token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Someone who cannot see it is told it does not exist.
    let response = post_json_auth(app, &uri, json!({}), &stranger_token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn instances_are_visible_to_starter_and_current_approvers_only(pool: PgPool) {
    let (lead, lead_token) = common::user_with_token(&pool, "lead", "member").await;
    let (_, starter_token) = common::user_with_token(&pool, "starter", "member").await;
    let (_, stranger_token) = common::user_with_token(&pool, "stranger", "member").await;
    let app = common::build_test_app(pool);

    let template = common::create_template(&app, &lead_token, &[("Lead", lead)]).await;
    let instance = common::start_instance(&app, &starter_token, &template["id"]).await;
    let uri = format!("/api/v1/workflow-instances/{}", instance["id"]);

    let response = get_auth(app.clone(), &uri, &starter_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = get_auth(app.clone(), &uri, &lead_token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = get_auth(app.clone(), &uri, &stranger_token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let listed_ids = |body: Value| -> Vec<Value> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].clone())
            .collect()
    };
    let response = get_auth(app.clone(), "/api/v1/workflow-instances", &lead_token).await;
    assert_eq!(listed_ids(body_json(response).await), vec![instance["id"].clone()]);
    let response = get_auth(app.clone(), "/api/v1/workflow-instances", &starter_token).await;
    assert_eq!(listed_ids(body_json(response).await), vec![instance["id"].clone()]);
    let response = get_auth(app, "/api/v1/workflow-instances", &stranger_token).await;
    assert!(listed_ids(body_json(response).await).is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn step_approvers_resolve_from_the_project(pool: PgPool) {
    let (owner, owner_token) = common::user_with_token(&pool, "owner", "member").await;
    let member = common::create_user(&pool, "member", "member").await;
    let app = common::build_test_app(pool);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/projects",
        json!({ "name": "Apollo" }),
        &owner_token,
    )
    .await;
    let project_id = body_json(response).await["data"]["id"].clone();
    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/projects/{project_id}/members"),
        json!({ "user_id": member }),
        &owner_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/workflow-templates",
        json!({
            "name": "Team vote",
            "steps": [
                { "name": "Owner", "step_type": "approval", "order": 1, "approver_type": "project_owner" },
                { "name": "Team", "step_type": "review", "order": 2, "approver_type": "any_member" },
            ],
        }),
        &owner_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let template = body_json(response).await["data"].clone();

    let response = post_json_auth(
        app.clone(),
        "/api/v1/workflow-instances",
        json!({ "template_id": template["id"], "project_id": project_id }),
        &owner_token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let instance = body_json(response).await["data"].clone();

    let approvers_of = |step: usize| {
        format!(
            "/api/v1/workflow-instances/{}/steps/{}/approvers",
            instance["id"], template["steps"][step]["id"]
        )
    };

    let response = get_auth(app.clone(), &approvers_of(0), &owner_token).await;
    assert_eq!(body_json(response).await["data"], json!([owner]));

    let response = get_auth(app, &approvers_of(1), &owner_token).await;
    let mut team: Vec<i64> = serde_json::from_value(body_json(response).await["data"].clone())
        .unwrap();
    team.sort_unstable();
    let mut expected = vec![owner, member];
    expected.sort_unstable();
    assert_eq!(team, expected);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn project_approvers_without_a_project_is_422(pool: PgPool) {
    let (_, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool);

    let response = post_json_auth(
        app.clone(),
        "/api/v1/workflow-templates",
        json!({
            "name": "Owner sign-off",
            "steps": [
                { "name": "Owner", "step_type": "approval", "order": 1, "approver_type": "project_owner" },
            ],
        }),
        &token,
    )
    .await;
    let template = body_json(response).await["data"].clone();
    let instance = common::start_instance(&app, &token, &template["id"]).await;

    let response = get_auth(
        app,
        &format!(
            "/api/v1/workflow-instances/{}/steps/{}/approvers",
            instance["id"], template["steps"][0]["id"]
        ),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Timing and concurrency
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn running_instance_past_its_step_timeout_is_overdue(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool.clone());

    let response = post_json_auth(
        app.clone(),
        "/api/v1/workflow-templates",
        json!({
            "name": "Hotfix sign-off",
            "steps": [
                { "name": "Lead", "step_type": "approval", "order": 1,
                  "approver_ids": [lead], "timeout_hours": 1 },
            ],
        }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let urgent = body_json(response).await["data"].clone();
    let relaxed = common::create_template(&app, &token, &[("Lead", lead)]).await;

    let late = common::start_instance(&app, &token, &urgent["id"]).await;
    let on_time = common::start_instance(&app, &token, &relaxed["id"]).await;
    assert_eq!(late["is_overdue"], false);

    // Both current steps started two hours ago; only the one-hour step is late.
    sqlx::query("UPDATE workflow_step_instances SET started_at = NOW() - INTERVAL '2 hours'")
        .execute(&pool)
        .await
        .unwrap();

    let response = get_auth(
        app.clone(),
        &format!("/api/v1/workflow-instances/{}", late["id"]),
        &token,
    )
    .await;
    assert_eq!(body_json(response).await["data"]["is_overdue"], true);

    let response = get_auth(app.clone(), "/api/v1/workflow-instances?overdue=true", &token).await;
    let overdue = body_json(response).await["data"].clone();
    let ids: Vec<&Value> = overdue.as_array().unwrap().iter().map(|i| &i["id"]).collect();
    assert_eq!(ids, vec![&late["id"]]);

    let response = get_auth(
        app.clone(),
        &format!("/api/v1/workflow-instances/{}", on_time["id"]),
        &token,
    )
    .await;
    assert_eq!(body_json(response).await["data"]["is_overdue"], false);

    // A finished instance is never overdue.
    let response =
        complete_step(&app, &token, &late["id"], &urgent["steps"][0]["id"], "approved").await;
    let finished = body_json(response).await["data"].clone();
    assert_eq!(finished["status"], "completed");
    assert_eq!(finished["is_overdue"], false);

    let response = get_auth(app, "/api/v1/workflow-instances?overdue=true", &token).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_completions_of_one_step_apply_once(pool: PgPool) {
    let (lead, token) = common::user_with_token(&pool, "lead", "member").await;
    let app = common::build_test_app(pool.clone());

    let template = common::create_template(&app, &token, &[("Lead", lead)]).await;
    let step = template["steps"][0]["id"].clone();
    let instance = common::start_instance(&app, &token, &template["id"]).await;

    let (a, b) = tokio::join!(
        complete_step(&app, &token, &instance["id"], &step, "approved"),
        complete_step(&app, &token, &instance["id"], &step, "rejected"),
    );
    let mut statuses = [a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM workflow_step_instances WHERE instance_id = $1 AND completed_at IS NOT NULL",
    )
    .bind(instance["id"].as_i64().unwrap())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(completed, 1);
}
