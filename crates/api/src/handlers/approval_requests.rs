//! Handlers for the `/approval-requests` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use taskflow_core::types::DbId;
use taskflow_db::models::approval_request::{
    ApprovalRequestListParams, ApprovalRequestView, AttachWorkflow, CreateApprovalRequest,
    DecisionNote, UpdateApprovalRequest,
};

use crate::engine::approvals::ApprovalRequestManager;
use crate::engine::Actor;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

type ViewResponse = AppResult<Json<DataResponse<ApprovalRequestView>>>;

fn manager(state: &AppState) -> ApprovalRequestManager<'_> {
    ApprovalRequestManager::new(&state.pool, &state.event_bus)
}

fn respond(view: ApprovalRequestView) -> Json<DataResponse<ApprovalRequestView>> {
    Json(DataResponse { data: view })
}

/// POST /api/v1/approval-requests
///
/// Creates a draft owned by the caller.
pub async fn create_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateApprovalRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ApprovalRequestView>>)> {
    let view = manager(&state).create(&Actor::from(&auth), &input).await?;
    Ok((StatusCode::CREATED, respond(view)))
}

/// GET /api/v1/approval-requests
pub async fn list_requests(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ApprovalRequestListParams>,
) -> AppResult<Json<DataResponse<Vec<ApprovalRequestView>>>> {
    let views = manager(&state).list(&Actor::from(&auth), &params).await?;
    Ok(Json(DataResponse { data: views }))
}

/// GET /api/v1/approval-requests/{id}
pub async fn get_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> ViewResponse {
    Ok(respond(manager(&state).get(&Actor::from(&auth), id).await?))
}

/// PUT /api/v1/approval-requests/{id}
///
/// Drafts only.
pub async fn update_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateApprovalRequest>,
) -> ViewResponse {
    Ok(respond(
        manager(&state)
            .update(&Actor::from(&auth), id, &input)
            .await?,
    ))
}

/// POST /api/v1/approval-requests/{id}/submit
pub async fn submit_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> ViewResponse {
    Ok(respond(manager(&state).submit(&Actor::from(&auth), id).await?))
}

/// POST /api/v1/approval-requests/{id}/review
pub async fn review_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> ViewResponse {
    Ok(respond(
        manager(&state)
            .begin_review(&Actor::from(&auth), id)
            .await?,
    ))
}

/// POST /api/v1/approval-requests/{id}/approve
pub async fn approve_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<DecisionNote>>,
) -> ViewResponse {
    let note = body.map(|Json(b)| b).unwrap_or_default();
    Ok(respond(
        manager(&state)
            .approve(&Actor::from(&auth), id, note.notes.as_deref())
            .await?,
    ))
}

/// POST /api/v1/approval-requests/{id}/reject
pub async fn reject_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<DecisionNote>>,
) -> ViewResponse {
    let note = body.map(|Json(b)| b).unwrap_or_default();
    Ok(respond(
        manager(&state)
            .reject(&Actor::from(&auth), id, note.notes.as_deref())
            .await?,
    ))
}

/// POST /api/v1/approval-requests/{id}/cancel
pub async fn cancel_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Option<Json<DecisionNote>>,
) -> ViewResponse {
    let note = body.map(|Json(b)| b).unwrap_or_default();
    Ok(respond(
        manager(&state)
            .cancel(&Actor::from(&auth), id, note.notes.as_deref())
            .await?,
    ))
}

/// POST /api/v1/approval-requests/{id}/workflow
pub async fn attach_workflow(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AttachWorkflow>,
) -> ViewResponse {
    Ok(respond(
        manager(&state)
            .attach_workflow(&Actor::from(&auth), id, input.instance_id)
            .await?,
    ))
}
