//! Route definitions for the `/workflow-templates` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workflow_templates as templates;
use crate::state::AppState;

/// Routes mounted at `/workflow-templates`.
///
/// ```text
/// GET    /                  -> list_templates
/// POST   /                  -> create_template
/// GET    /{id}              -> get_template
/// PUT    /{id}              -> update_template
/// DELETE /{id}              -> delete_template
/// GET    /{id}/steps        -> list_steps
/// POST   /{id}/deactivate   -> deactivate_template
/// POST   /{id}/activate     -> activate_template
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/{id}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/{id}/steps", get(templates::list_steps))
        .route("/{id}/deactivate", post(templates::deactivate_template))
        .route("/{id}/activate", post(templates::activate_template))
}
