//! Route definitions for the `/approval-requests` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::approval_requests as requests;
use crate::state::AppState;

/// Routes mounted at `/approval-requests`.
///
/// ```text
/// GET  /                 -> list_requests
/// POST /                 -> create_request
/// GET  /{id}             -> get_request
/// PUT  /{id}             -> update_request (drafts)
/// POST /{id}/submit      -> submit_request
/// POST /{id}/review      -> review_request (admin)
/// POST /{id}/approve     -> approve_request (admin)
/// POST /{id}/reject      -> reject_request (admin)
/// POST /{id}/cancel      -> cancel_request
/// POST /{id}/workflow    -> attach_workflow
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(requests::list_requests).post(requests::create_request),
        )
        .route(
            "/{id}",
            get(requests::get_request).put(requests::update_request),
        )
        .route("/{id}/submit", post(requests::submit_request))
        .route("/{id}/review", post(requests::review_request))
        .route("/{id}/approve", post(requests::approve_request))
        .route("/{id}/reject", post(requests::reject_request))
        .route("/{id}/cancel", post(requests::cancel_request))
        .route("/{id}/workflow", post(requests::attach_workflow))
}
