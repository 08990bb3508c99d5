pub mod admin;
pub mod approval_requests;
pub mod auth;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod workflow_instances;
pub mod workflow_templates;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/login                                          login (public)
/// /admin/users                                         list, create (admin)
/// /projects, /projects/{id}, /projects/{id}/members    target projects
/// /tasks, /tasks/{id}                                  target tasks
/// /workflow-templates/...                              template registry
/// /workflow-instances/...                              instance engine
/// /approval-requests/...                               approval requests
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
        .nest("/projects", projects::router())
        .nest("/tasks", tasks::router())
        .nest("/workflow-templates", workflow_templates::router())
        .nest("/workflow-instances", workflow_instances::router())
        .nest("/approval-requests", approval_requests::router())
}
