//! Route definitions for the `/projects` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::projects;
use crate::state::AppState;

/// Routes mounted at `/projects`.
///
/// ```text
/// POST /                -> create_project
/// GET  /{id}            -> get_project
/// GET  /{id}/members    -> list_members
/// POST /{id}/members    -> add_member
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(projects::create_project))
        .route("/{id}", get(projects::get_project))
        .route(
            "/{id}/members",
            get(projects::list_members).post(projects::add_member),
        )
}
