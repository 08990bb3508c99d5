//! Route definitions for the `/workflow-instances` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workflow_instances as instances;
use crate::state::AppState;

/// Routes mounted at `/workflow-instances`.
///
/// ```text
/// GET  /                                  -> list_instances
/// POST /                                  -> start_instance
/// GET  /{id}                              -> get_instance
/// POST /{id}/cancel                       -> cancel_instance
/// GET  /{id}/steps/{step_id}/approvers    -> list_step_approvers
/// POST /{id}/steps/{step_id}/begin        -> begin_step
/// POST /{id}/steps/{step_id}/complete     -> complete_step
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(instances::list_instances).post(instances::start_instance),
        )
        .route("/{id}", get(instances::get_instance))
        .route("/{id}/cancel", post(instances::cancel_instance))
        .route(
            "/{id}/steps/{step_id}/approvers",
            get(instances::list_step_approvers),
        )
        .route("/{id}/steps/{step_id}/begin", post(instances::begin_step))
        .route(
            "/{id}/steps/{step_id}/complete",
            post(instances::complete_step),
        )
}
