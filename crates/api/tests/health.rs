//! `/health` and behaviour shared by every route.

mod common;

use axum::http::StatusCode;
use common::{body_json, get};
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn health_reports_ok_with_database_up(pool: PgPool) {
    let response = get(common::build_test_app(pool), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_healthy"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn every_response_gets_a_request_id(pool: PgPool) {
    let app = common::build_test_app(pool);

    for uri in ["/health", "/api/v1/no-such-route"] {
        let response = get(app.clone(), uri).await;
        let id = response.headers().get("x-request-id");
        assert!(id.is_some_and(|v| !v.is_empty()), "{uri} had no request id");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unmatched_path_is_404(pool: PgPool) {
    let response = get(common::build_test_app(pool), "/api/v1/no-such-route").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
